use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    tracks::PlayMode, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{audio::voice::FinishSignal, error::VoiceError};

/// Resolves a track's finish signal from songbird's `End`/`Error` events.
///
/// Registered once per event kind with a shared slot; whichever event
/// fires first consumes the signal.
#[derive(Clone)]
pub struct TrackEndNotifier {
    pub guild_id: GuildId,
    pub signal: Arc<Mutex<Option<FinishSignal>>>,
}

impl TrackEndNotifier {
    pub fn new(guild_id: GuildId, signal: FinishSignal) -> Self {
        Self {
            guild_id,
            signal: Arc::new(Mutex::new(Some(signal))),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let mut failure = None;
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    error!("❌ Track error in guild {}: {:?}", self.guild_id, e);
                    failure = Some(format!("{:?}", e));
                }
            }
        }

        let signal = self.signal.lock().take();
        if let Some(signal) = signal {
            debug!("🎵 Track finished in guild {}", self.guild_id);
            let result = match failure {
                Some(reason) => Err(VoiceError::Playback(reason)),
                None => Ok(()),
            };
            // The loop may already be gone (guild torn down).
            let _ = signal.send(result);
        }

        // Stop listening once the signal is spent.
        Some(VoiceEvent::Cancel)
    }
}
