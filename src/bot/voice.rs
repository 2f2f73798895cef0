use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::events::TrackEndNotifier;
use crate::{
    audio::{
        queue::QueuedTrack,
        voice::{FinishSignal, VoiceConnection},
    },
    error::VoiceError,
};

/// [`VoiceConnection`] on top of a songbird [`Call`].
pub struct SongbirdConnection {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    pub fn new(
        guild_id: GuildId,
        manager: Arc<Songbird>,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            guild_id,
            manager,
            call,
            http,
            current: Mutex::new(None),
        }
    }

    fn handle(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(
        &self,
        track: &QueuedTrack,
        volume: f32,
        finished: FinishSignal,
    ) -> Result<(), VoiceError> {
        let input: Input =
            HttpRequest::new(self.http.clone(), track.metadata.stream_url.clone()).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        handle
            .set_volume(volume)
            .map_err(|e| VoiceError::Playback(e.to_string()))?;

        let notifier = TrackEndNotifier::new(self.guild_id, finished);
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| VoiceError::Playback(format!("could not watch track: {}", e)))?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        let handle = self.current.lock().take();
        if let Some(handle) = handle {
            let _ = handle.stop();
        }
    }

    async fn set_volume(&self, volume: f32) -> Result<(), VoiceError> {
        match self.handle() {
            Some(handle) => handle
                .set_volume(volume)
                .map_err(|e| VoiceError::Playback(e.to_string())),
            None => Ok(()),
        }
    }

    async fn pause(&self) -> Result<(), VoiceError> {
        let handle = self.handle().ok_or(VoiceError::NotConnected)?;
        handle.pause().map_err(|e| VoiceError::Playback(e.to_string()))
    }

    async fn resume(&self) -> Result<(), VoiceError> {
        let handle = self.handle().ok_or(VoiceError::NotConnected)?;
        handle.play().map_err(|e| VoiceError::Playback(e.to_string()))
    }

    async fn is_paused(&self) -> bool {
        match self.handle() {
            Some(handle) => matches!(
                handle.get_info().await.map(|state| state.playing),
                Ok(PlayMode::Pause)
            ),
            None => false,
        }
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        let call = self.call.lock().await;
        call.current_channel().map(|channel| ChannelId::from(channel.0))
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Connection(e.to_string()))?;
        info!("🔀 Moved to voice channel {} in guild {}", channel_id, self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) {
        self.stop().await;
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error leaving voice in guild {}: {:?}", self.guild_id, e);
        }
    }
}
