//! # Bot Module
//!
//! Discord side of the Kronos music bot.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and dispatch ([`handlers`])
//! - The songbird-backed [`VoiceConnection`](crate::audio::voice::VoiceConnection)
//!   used by guild players ([`voice`])
//! - The track end notifier bridging songbird events to the playback loop
//!   ([`events`])
//!
//! ## Architecture
//!
//! [`KronosBot`] implements Serenity's [`EventHandler`]. It holds the
//! [`GuildRegistry`] that owns every guild's player and the [`TrackResolver`]
//! used by `/play`. Handlers never touch songbird directly except through
//! [`KronosBot::connect_voice`].

use anyhow::{anyhow, Result};
use serenity::{
    all::{
        ActivityData, ChannelId, Context, EventHandler, GuildId, Interaction, OnlineStatus, Ready,
        VoiceState,
    },
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod voice;

use self::voice::SongbirdConnection;
use crate::{
    audio::{player::GuildPlayer, registry::GuildRegistry},
    config::Config,
    error::{PlayerError, VoiceError},
    sources::TrackResolver,
};

/// Event handler for the bot.
pub struct KronosBot {
    pub config: Arc<Config>,
    pub registry: Arc<GuildRegistry>,
    pub resolver: TrackResolver,
    /// Shared client for the audio stream requests
    http_client: reqwest::Client,
}

impl KronosBot {
    pub fn new(config: Arc<Config>, registry: Arc<GuildRegistry>, resolver: TrackResolver) -> Self {
        Self {
            config,
            registry,
            resolver,
            http_client: reqwest::Client::new(),
        }
    }

    /// Registers slash commands on the configured guild, or globally.
    ///
    /// Guild commands show up almost immediately; global ones can take up to
    /// an hour to propagate.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registering commands for guild {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
            }
            None => {
                info!("🌐 Registering global commands");
                commands::register_global_commands(ctx).await?;
            }
        }

        info!("✅ Commands registered");
        Ok(())
    }

    /// Puts the guild's player in `channel_id`, connecting or moving as needed.
    ///
    /// # Required Permissions
    ///
    /// - `Connect` - To join the voice channel
    /// - `Speak` - To play audio in the channel
    pub async fn connect_voice(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<GuildPlayer>> {
        let player = self.registry.get_or_create(guild_id);

        if let Some(voice) = player.voice() {
            voice.move_to(channel_id).await?;
            return Ok(player);
        }

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow!("Songbird not initialised"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))?;

        let connection = Arc::new(SongbirdConnection::new(
            guild_id,
            manager,
            call,
            self.http_client.clone(),
        ));

        // The player may have idled out while we were joining.
        let player = match player.attach_voice(connection.clone()) {
            Ok(()) => player,
            Err(PlayerError::Closed) => {
                warn!("Player for guild {} closed during join, replacing it", guild_id);
                let fresh = self.registry.get_or_create(guild_id);
                fresh.attach_voice(connection)?;
                fresh
            }
            Err(e) => return Err(e.into()),
        };

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(player)
    }
}

#[async_trait]
impl EventHandler for KronosBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }

        ctx.set_presence(Some(ActivityData::listening("/play")), OnlineStatus::Idle);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Drops the guild's state when the bot is disconnected from voice by
    /// someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            warn!("Voice state update without guild for the bot");
            return;
        };

        if self.registry.remove(guild_id).await {
            info!("🔌 Disconnected from voice in guild {}, state released", guild_id);
        }
    }
}
