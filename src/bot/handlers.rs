use anyhow::{bail, Result};
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
        GetMessages,
    },
    model::{
        application::{CommandDataOptionValue, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
        permissions::Permissions,
    },
    prelude::Context,
};
use tracing::{info, warn};

use super::{commands, KronosBot};
use crate::{
    audio::{
        player::{PlaybackStatus, SkipOutcome},
        queue::QueuedTrack,
    },
    error::PlayerError,
    ui::embeds,
};

/// Handles slash commands
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &KronosBot) -> Result<()> {
    let name = command.data.name.clone();
    info!(
        "📝 /{} used by {} in guild {:?}",
        name, command.user.name, command.guild_id
    );

    if let Err(e) = dispatch(ctx, &command, bot).await {
        warn!("Command /{} failed: {}", name, e);
        report_error(ctx, &command, &e.to_string()).await?;
    }

    Ok(())
}

async fn dispatch(ctx: &Context, command: &CommandInteraction, bot: &KronosBot) -> Result<()> {
    let name = command.data.name.as_str();

    if name == "whoami" {
        return reply(ctx, command, format!("You are {}", command.user.name)).await;
    }

    let Some(guild_id) = command.guild_id else {
        bail!("This command can't be used in DM channels.");
    };

    if commands::requires_manage_guild(name) && !has_permission(command, Permissions::MANAGE_GUILD) {
        bail!("You need the Manage Server permission to use this command.");
    }

    match name {
        "join" => handle_join(ctx, command, bot, guild_id).await,
        "summon" => handle_summon(ctx, command, bot, guild_id).await,
        "leave" | "disconnect" => handle_leave(ctx, command, bot, guild_id).await,
        "volume" => handle_volume(ctx, command, bot, guild_id).await,
        "now" | "current" | "playing" => handle_now(ctx, command, bot, guild_id).await,
        "pause" => handle_pause(ctx, command, bot, guild_id).await,
        "resume" => handle_resume(ctx, command, bot, guild_id).await,
        "stop" => handle_stop(ctx, command, bot, guild_id).await,
        "skip" => handle_skip(ctx, command, bot, guild_id).await,
        "queue" => handle_queue(ctx, command, bot, guild_id).await,
        "shuffle" => handle_shuffle(ctx, command, bot, guild_id).await,
        "remove" => handle_remove(ctx, command, bot, guild_id).await,
        "loop" => handle_loop(ctx, command, bot, guild_id).await,
        "play" => handle_play(ctx, command, bot, guild_id).await,
        "clear" => handle_clear(ctx, command).await,
        _ => bail!("Unknown command"),
    }
}

// Connection

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let destination = ensure_voice_state(ctx, command, bot, guild_id).await?;
    bot.connect_voice(ctx, guild_id, destination).await?;

    reply(ctx, command, format!("🔊 Joined <#{}>", destination)).await
}

async fn handle_summon(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let requested = option(command, "channel").and_then(CommandDataOptionValue::as_channel_id);
    let destination = match requested.or_else(|| user_voice_channel(ctx, guild_id, command.user.id)) {
        Some(channel_id) => channel_id,
        None => bail!("You are neither connected to a voice channel nor specified a channel to join."),
    };

    bot.connect_voice(ctx, guild_id, destination).await?;

    reply(ctx, command, format!("🔊 Joined <#{}>", destination)).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let connected = bot
        .registry
        .get(guild_id)
        .is_some_and(|player| player.status() != PlaybackStatus::Idle);

    if !connected {
        return reply(ctx, command, "Not connected to any voice channel.").await;
    }

    bot.registry.remove(guild_id).await;
    reply(ctx, command, "👋 Left the voice channel").await
}

// Playback

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(level) = option(command, "level").and_then(CommandDataOptionValue::as_i64) else {
        bail!("Missing volume level");
    };

    let player = bot.registry.get_or_create(guild_id);
    player.set_volume(level).await?;

    reply(ctx, command, format!("Volume of the player set to {}%", level)).await
}

async fn handle_now(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let current = bot
        .registry
        .get(guild_id)
        .filter(|player| player.status() == PlaybackStatus::Playing)
        .and_then(|player| player.current());

    match current {
        Some(track) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().embed(embeds::now_playing(&track)),
                    ),
                )
                .await?;
            Ok(())
        }
        None => reply(ctx, command, PlayerError::NothingPlaying.to_string()).await,
    }
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let player = bot.registry.get(guild_id).ok_or(PlayerError::NothingPlaying)?;

    let message = if player.pause().await? {
        "⏯️ Paused"
    } else {
        "Already paused."
    };
    reply(ctx, command, message).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let player = bot.registry.get(guild_id).ok_or(PlayerError::NothingPlaying)?;

    let message = if player.resume().await? {
        "⏯️ Resumed"
    } else {
        "The player is not paused."
    };
    reply(ctx, command, message).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let dropped = match bot.registry.get(guild_id) {
        Some(player) => player.halt().await,
        None => 0,
    };

    reply(ctx, command, format!("⏹️ Stopped, {} queued tracks cleared", dropped)).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return reply(ctx, command, "Not playing any music right now...").await;
    };

    let message = match player.vote_skip(command.user.id).await {
        Ok(SkipOutcome::AutoSkipped) => "⏭️ Skipped".to_string(),
        Ok(SkipOutcome::VoteRecorded(votes)) => format!(
            "Skip vote added, currently at **{}/{}**",
            votes, bot.config.skip_vote_threshold
        ),
        Ok(SkipOutcome::AlreadyVoted) => "You have already voted to skip this song.".to_string(),
        Err(PlayerError::NothingPlaying) => "Not playing any music right now...".to_string(),
        Err(e) => return Err(e.into()),
    };
    reply(ctx, command, message).await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let player = bot.registry.get(guild_id).ok_or(PlayerError::NothingPlaying)?;

    let message = if player.toggle_loop()? {
        "🔂 Loop enabled"
    } else {
        "➡️ Loop disabled"
    };
    reply(ctx, command, message).await
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(search) = option(command, "search").and_then(CommandDataOptionValue::as_str) else {
        bail!("Missing search term");
    };

    let destination = ensure_voice_state(ctx, command, bot, guild_id).await?;

    // Resolution can take seconds
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let player = match bot.registry.get(guild_id) {
        Some(player) if player.status() != PlaybackStatus::Idle => player,
        _ => bot.connect_voice(ctx, guild_id, destination).await?,
    };

    let content = match bot.resolver.resolve(search).await {
        Ok(metadata) => {
            let content = format!("Enqueued {}", metadata);
            let track = QueuedTrack::new(metadata, command.user.id, command.channel_id);
            match player.enqueue(track.clone()) {
                Ok(()) => {}
                // Idled out while the search ran; start over with a fresh player.
                Err(PlayerError::Closed) => {
                    bot.connect_voice(ctx, guild_id, destination)
                        .await?
                        .enqueue(track)?;
                }
                Err(e) => return Err(e.into()),
            }
            content
        }
        Err(e) => format!("An error occurred while processing this request: {}", e),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

// Queue

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = option(command, "page")
        .and_then(CommandDataOptionValue::as_i64)
        .unwrap_or(1)
        .max(1) as usize;

    let Some(player) = bot.registry.get(guild_id).filter(|p| !p.queue().is_empty()) else {
        return reply(ctx, command, "Empty queue.").await;
    };

    let page = player.queue().page(page, bot.config.queue_page_size);

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embeds::queue_page(&page)),
            ),
        )
        .await?;

    Ok(())
}

async fn handle_shuffle(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id).filter(|p| !p.queue().is_empty()) else {
        return reply(ctx, command, "Empty queue.").await;
    };

    player.queue().shuffle();
    reply(ctx, command, "🔀 Queue shuffled").await
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(index) = option(command, "index").and_then(CommandDataOptionValue::as_i64) else {
        bail!("Missing queue position");
    };

    let Some(player) = bot.registry.get(guild_id).filter(|p| !p.queue().is_empty()) else {
        return reply(ctx, command, "Empty queue.").await;
    };

    // Positions are 1-based for users
    let position = usize::try_from(index - 1).map_err(|_| PlayerError::IndexOutOfRange {
        index: 0,
        len: player.queue().len(),
    })?;
    let removed = player.queue().remove_at(position)?;

    reply(ctx, command, format!("✅ Removed {}", removed.metadata)).await
}

// Utilities

async fn handle_clear(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    if !has_permission(command, Permissions::MANAGE_MESSAGES) {
        bail!("You need the Manage Messages permission to use this command.");
    }

    let amount = option(command, "amount")
        .and_then(CommandDataOptionValue::as_i64)
        .unwrap_or(3)
        .clamp(1, 100) as u8;

    let messages = command
        .channel_id
        .messages(ctx, GetMessages::new().limit(amount))
        .await?;
    let ids: Vec<_> = messages.iter().map(|message| message.id).collect();

    match ids.as_slice() {
        [] => {}
        [id] => command.channel_id.delete_message(&ctx.http, *id).await?,
        _ => command.channel_id.delete_messages(&ctx.http, &ids).await?,
    }

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(format!("🧹 Deleted {} messages", ids.len()))
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Helpers

async fn reply(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

/// Sends the error to the user, editing the deferred reply if one exists.
async fn report_error(ctx: &Context, command: &CommandInteraction, error: &str) -> Result<()> {
    let content = format!("An error occurred: {}", error);

    let created = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content.clone())
                    .ephemeral(true),
            ),
        )
        .await;

    if created.is_err() {
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await?;
    }

    Ok(())
}

fn option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a CommandDataOptionValue> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .map(|opt| &opt.value)
}

fn has_permission(command: &CommandInteraction, permission: Permissions) -> bool {
    command
        .member
        .as_ref()
        .and_then(|member| member.permissions)
        .is_some_and(|granted| granted.contains(permission))
}

/// The invoker's voice channel, as seen by the cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

/// The invoker must be in voice, and the bot must not be busy elsewhere.
async fn ensure_voice_state(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &KronosBot,
    guild_id: GuildId,
) -> Result<ChannelId> {
    let Some(destination) = user_voice_channel(ctx, guild_id, command.user.id) else {
        bail!("You are not connected to any voice channel.");
    };

    if let Some(voice) = bot.registry.get(guild_id).and_then(|player| player.voice()) {
        if let Some(current) = voice.current_channel().await {
            if current != destination {
                bail!("Bot is already in a voice channel.");
            }
        }
    }

    Ok(destination)
}
