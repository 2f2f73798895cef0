//! Seams between the playback state machine and the chat platform.
//!
//! The state machine only talks to these traits; the songbird/serenity
//! implementations live in [`crate::bot`].

use async_trait::async_trait;
use serenity::model::id::ChannelId;
use tokio::sync::oneshot;

use super::queue::QueuedTrack;
use crate::error::VoiceError;

/// Single-shot "track finished" signal. `Err` carries a playback failure.
pub type FinishSignal = oneshot::Sender<Result<(), VoiceError>>;

/// One guild's voice connection.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Starts streaming `track` at `volume`. `finished` fires exactly once,
    /// when the stream ends, is stopped, or fails.
    async fn play(
        &self,
        track: &QueuedTrack,
        volume: f32,
        finished: FinishSignal,
    ) -> Result<(), VoiceError>;

    /// Stops the active stream, if any. Fires its finish signal.
    async fn stop(&self);

    async fn set_volume(&self, volume: f32) -> Result<(), VoiceError>;

    async fn pause(&self) -> Result<(), VoiceError>;

    async fn resume(&self) -> Result<(), VoiceError>;

    async fn is_paused(&self) -> bool;

    async fn current_channel(&self) -> Option<ChannelId>;

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError>;

    async fn disconnect(&self);
}

/// Outgoing notifications about playback.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn now_playing(&self, track: &QueuedTrack) -> anyhow::Result<()>;

    async fn playback_failed(&self, track: &QueuedTrack, error: &VoiceError) -> anyhow::Result<()>;
}
