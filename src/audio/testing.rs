//! In-memory stand-ins for the voice connection and announcer.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, UserId};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::mpsc;

use super::{
    queue::QueuedTrack,
    voice::{Announcer, FinishSignal, VoiceConnection},
};
use crate::{error::VoiceError, sources::TrackMetadata};

pub fn track(title: &str, requester: u64) -> QueuedTrack {
    let metadata = TrackMetadata {
        title: title.to_string(),
        uploader: "Uploader".to_string(),
        uploader_url: None,
        upload_date: None,
        thumbnail: None,
        description: None,
        duration_secs: 65,
        duration: "1 minutes, 5 seconds".to_string(),
        tags: Vec::new(),
        url: format!("https://example.com/{}", title),
        views: None,
        likes: None,
        dislikes: None,
        stream_url: format!("https://cdn.example.com/{}", title),
    };
    QueuedTrack::new(metadata, UserId::new(requester), ChannelId::new(99))
}

/// Records every `play` and hands the finish signal back to the test.
pub struct FakeVoice {
    pending: Mutex<Option<FinishSignal>>,
    played: mpsc::UnboundedSender<String>,
    last_volume: Mutex<Option<f32>>,
    paused: AtomicBool,
    fail_next: AtomicBool,
    disconnects: AtomicUsize,
    stops: AtomicUsize,
    channel: Mutex<Option<ChannelId>>,
}

impl FakeVoice {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (played, rx) = mpsc::unbounded_channel();
        let voice = Arc::new(Self {
            pending: Mutex::new(None),
            played,
            last_volume: Mutex::new(None),
            paused: AtomicBool::new(false),
            fail_next: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            channel: Mutex::new(Some(ChannelId::new(500))),
        });
        (voice, rx)
    }

    /// Ends the active stream. False if nothing was playing.
    pub fn finish(&self, result: Result<(), VoiceError>) -> bool {
        let pending = self.pending.lock().take();
        match pending {
            Some(signal) => signal.send(result).is_ok(),
            None => false,
        }
    }

    pub fn fail_next_play(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn last_volume(&self) -> Option<f32> {
        *self.last_volume.lock()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnect_count() > 0
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeVoice {
    async fn play(
        &self,
        track: &QueuedTrack,
        volume: f32,
        finished: FinishSignal,
    ) -> Result<(), VoiceError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VoiceError::Playback("stream refused".into()));
        }
        *self.pending.lock() = Some(finished);
        *self.last_volume.lock() = Some(volume);
        self.paused.store(false, Ordering::SeqCst);
        let _ = self.played.send(track.title().to_string());
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.finish(Ok(()));
    }

    async fn set_volume(&self, volume: f32) -> Result<(), VoiceError> {
        *self.last_volume.lock() = Some(volume);
        Ok(())
    }

    async fn pause(&self) -> Result<(), VoiceError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), VoiceError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn current_channel(&self) -> Option<ChannelId> {
        *self.channel.lock()
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError> {
        *self.channel.lock() = Some(channel_id);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.channel.lock() = None;
        self.finish(Ok(()));
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    now_playing: Mutex<Vec<String>>,
    failed: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn now_playing_titles(&self) -> Vec<String> {
        self.now_playing.lock().clone()
    }

    pub fn failed_titles(&self) -> Vec<String> {
        self.failed.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn now_playing(&self, track: &QueuedTrack) -> anyhow::Result<()> {
        self.now_playing.lock().push(track.title().to_string());
        Ok(())
    }

    async fn playback_failed(&self, track: &QueuedTrack, _error: &VoiceError) -> anyhow::Result<()> {
        self.failed.lock().push(track.title().to_string());
        Ok(())
    }
}
