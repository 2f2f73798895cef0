use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http};
use std::sync::Arc;
use tracing::debug;

use super::embeds;
use crate::{
    audio::{queue::QueuedTrack, voice::Announcer},
    error::VoiceError,
};

/// Posts playback notifications to the channel each track was requested from.
pub struct ChannelAnnouncer {
    http: Arc<Http>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn now_playing(&self, track: &QueuedTrack) -> anyhow::Result<()> {
        track
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(embeds::now_playing(track)))
            .await?;
        debug!("Now playing sent to channel {}", track.channel_id);
        Ok(())
    }

    async fn playback_failed(&self, track: &QueuedTrack, error: &VoiceError) -> anyhow::Result<()> {
        let description = format!("Couldn't play {}: {}", track.metadata, error);
        track
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(embeds::error(&description)))
            .await?;
        Ok(())
    }
}
