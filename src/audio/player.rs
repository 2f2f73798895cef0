use parking_lot::{Mutex, RwLock};
use serenity::model::id::{GuildId, UserId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    queue::{QueuedTrack, TrackQueue},
    voice::{Announcer, VoiceConnection},
};
use crate::error::{PlayerError, VoiceError};

/// Per-guild playback tunables.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub default_volume: f32,
    pub idle_timeout: Duration,
    pub skip_threshold: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            idle_timeout: Duration::from_secs(180),
            skip_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// No voice connection.
    Idle,
    /// Connected, waiting for the next track.
    Waiting,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    AutoSkipped,
    VoteRecorded(usize),
    AlreadyVoted,
}

/// Why a playback loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    IdleTimeout,
    Cancelled,
}

/// Playback state of one guild.
///
/// Owns the pending queue, the now-playing slot, loop/volume flags and the
/// skip-vote set. A single background task started with [`start`](Self::start)
/// drives play -> wait for end -> advance, and is the only writer of the
/// now-playing slot. Command tasks mutate the queue and the flags.
pub struct GuildPlayer {
    guild_id: GuildId,
    settings: PlayerSettings,
    queue: TrackQueue<QueuedTrack>,
    current: RwLock<Option<QueuedTrack>>,
    loop_enabled: AtomicBool,
    volume: Mutex<f32>,
    skip_votes: Mutex<HashSet<UserId>>,
    voice: RwLock<Option<Arc<dyn VoiceConnection>>>,
    announcer: Arc<dyn Announcer>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl GuildPlayer {
    pub fn new(guild_id: GuildId, settings: PlayerSettings, announcer: Arc<dyn Announcer>) -> Self {
        Self {
            guild_id,
            settings,
            queue: TrackQueue::new(),
            current: RwLock::new(None),
            loop_enabled: AtomicBool::new(false),
            volume: Mutex::new(settings.default_volume),
            skip_votes: Mutex::new(HashSet::new()),
            voice: RwLock::new(None),
            announcer,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the playback loop. Can only be called once per player.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<LoopExit>, PlayerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PlayerError::AlreadyRunning);
        }
        Ok(tokio::spawn(Arc::clone(self).run()))
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &TrackQueue<QueuedTrack> {
        &self.queue
    }

    /// Fails with [`PlayerError::Closed`] once the player has shut down.
    pub fn enqueue(&self, track: QueuedTrack) -> Result<(), PlayerError> {
        let title = track.title().to_string();
        self.queue.append(track)?;
        info!("➕ Queued in guild {}: {}", self.guild_id, title);
        Ok(())
    }

    pub fn current(&self) -> Option<QueuedTrack> {
        self.current.read().clone()
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::SeqCst)
    }

    pub fn voice(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.voice.read().clone()
    }

    /// Fails with [`PlayerError::Closed`] once the player has shut down.
    pub fn attach_voice(&self, connection: Arc<dyn VoiceConnection>) -> Result<(), PlayerError> {
        let mut voice = self.voice.write();
        // `stop` cancels before taking the voice, so a connection stored here
        // is always seen by it.
        if self.is_closed() {
            return Err(PlayerError::Closed);
        }
        *voice = Some(connection);
        info!("🔊 Voice attached in guild {}", self.guild_id);
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.voice.read().is_some() && self.current.read().is_some()
    }

    /// True once [`stop`](Self::stop) ran; a closed player is never reused.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.queue.is_closed()
    }

    pub fn status(&self) -> PlaybackStatus {
        match (self.voice.read().is_some(), self.current.read().is_some()) {
            (false, _) => PlaybackStatus::Idle,
            (true, false) => PlaybackStatus::Waiting,
            (true, true) => PlaybackStatus::Playing,
        }
    }

    /// Forces the active stream to end, which advances the loop.
    pub async fn skip(&self) {
        self.skip_votes.lock().clear();

        if !self.is_playing() {
            return;
        }
        if let Some(voice) = self.voice() {
            debug!("⏭️ Skipping in guild {}", self.guild_id);
            voice.stop().await;
        }
    }

    pub async fn vote_skip(&self, voter: UserId) -> Result<SkipOutcome, PlayerError> {
        let requester = self
            .playing_track()
            .ok_or(PlayerError::NothingPlaying)?
            .requested_by;

        if voter == requester {
            self.skip().await;
            return Ok(SkipOutcome::AutoSkipped);
        }

        let votes = {
            let mut votes = self.skip_votes.lock();
            if !votes.insert(voter) {
                return Ok(SkipOutcome::AlreadyVoted);
            }
            votes.len()
        };

        if votes >= self.settings.skip_threshold {
            self.skip().await;
            Ok(SkipOutcome::AutoSkipped)
        } else {
            Ok(SkipOutcome::VoteRecorded(votes))
        }
    }

    /// Sets the volume from a percentage in `[0, 100]`.
    pub async fn set_volume(&self, percent: i64) -> Result<f32, PlayerError> {
        if !(0..=100).contains(&percent) {
            return Err(PlayerError::InvalidRange(percent));
        }

        let volume = percent as f32 / 100.0;
        *self.volume.lock() = volume;

        if let Some(voice) = self.playing_voice() {
            voice.set_volume(volume).await?;
        }

        info!("🔊 Volume in guild {} set to {}%", self.guild_id, percent);
        Ok(volume)
    }

    pub fn toggle_loop(&self) -> Result<bool, PlayerError> {
        if !self.is_playing() {
            return Err(PlayerError::NothingPlaying);
        }
        let enabled = !self.loop_enabled.fetch_xor(true, Ordering::SeqCst);
        info!("🔂 Loop in guild {}: {}", self.guild_id, enabled);
        Ok(enabled)
    }

    /// Pauses the active stream. `Ok(false)` if it was already paused.
    pub async fn pause(&self) -> Result<bool, PlayerError> {
        let voice = self.playing_voice().ok_or(PlayerError::NothingPlaying)?;
        if voice.is_paused().await {
            return Ok(false);
        }
        voice.pause().await?;
        info!("⏸️ Paused in guild {}", self.guild_id);
        Ok(true)
    }

    /// Resumes a paused stream. `Ok(false)` if it was not paused.
    pub async fn resume(&self) -> Result<bool, PlayerError> {
        let voice = self.playing_voice().ok_or(PlayerError::NothingPlaying)?;
        if !voice.is_paused().await {
            return Ok(false);
        }
        voice.resume().await?;
        info!("▶️ Resumed in guild {}", self.guild_id);
        Ok(true)
    }

    /// Drops pending tracks and ends the active one, keeping the connection.
    pub async fn halt(&self) -> usize {
        let dropped = self.queue.clear();
        self.loop_enabled.store(false, Ordering::SeqCst);
        self.skip().await;
        dropped
    }

    /// Tears the player down: cancels the loop, clears the queue and
    /// disconnects. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.queue.close();

        let voice = self.voice.write().take();
        if let Some(voice) = voice {
            voice.disconnect().await;
            info!("👋 Disconnected from voice in guild {}", self.guild_id);
        }
    }

    fn playing_track(&self) -> Option<QueuedTrack> {
        if self.voice.read().is_none() {
            return None;
        }
        self.current()
    }

    fn playing_voice(&self) -> Option<Arc<dyn VoiceConnection>> {
        if self.current.read().is_none() {
            return None;
        }
        self.voice()
    }

    async fn run(self: Arc<Self>) -> LoopExit {
        info!("🎶 Playback loop started for guild {}", self.guild_id);

        loop {
            let replay = if self.loop_enabled() {
                self.current()
            } else {
                None
            };

            let track = match replay {
                Some(track) => {
                    debug!("🔂 Replaying {} in guild {}", track.title(), self.guild_id);
                    track
                }
                None => {
                    *self.current.write() = None;

                    tokio::select! {
                        _ = self.cancel.cancelled() => return LoopExit::Cancelled,
                        popped = self.queue.pop_front(self.settings.idle_timeout) => match popped {
                            Ok(track) => track,
                            Err(_) if !self.queue.close_if_empty() => continue,
                            Err(_) => {
                                info!(
                                    "💤 No tracks for {:?} in guild {}, disconnecting",
                                    self.settings.idle_timeout, self.guild_id
                                );
                                self.stop().await;
                                return LoopExit::IdleTimeout;
                            }
                        }
                    }
                }
            };

            *self.current.write() = Some(track.clone());
            self.skip_votes.lock().clear();

            if let Err(error) = self.play_track(&track).await {
                self.recover(&track, error).await;
            }

            if self.cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }
        }
    }

    /// Plays one track and waits for its finish signal.
    async fn play_track(&self, track: &QueuedTrack) -> Result<(), VoiceError> {
        let voice = self.voice().ok_or(VoiceError::NotConnected)?;
        let (finished_tx, finished_rx) = oneshot::channel();

        voice.play(track, self.volume(), finished_tx).await?;
        info!("🎵 Playing in guild {}: {}", self.guild_id, track.title());

        if let Err(e) = self.announcer.now_playing(track).await {
            warn!("Could not send now playing in guild {}: {:?}", self.guild_id, e);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            // A dropped sender means the stream went away without reporting; treat as ended.
            finished = finished_rx => finished.unwrap_or(Ok(())),
        }
    }

    async fn recover(&self, track: &QueuedTrack, error: VoiceError) {
        error!(
            "❌ Playback of {} failed in guild {}: {}",
            track.title(),
            self.guild_id,
            error
        );
        // Never replay a stream that just failed.
        self.loop_enabled.store(false, Ordering::SeqCst);

        if let Err(e) = self.announcer.playback_failed(track, &error).await {
            warn!("Could not report playback failure in guild {}: {:?}", self.guild_id, e);
        }
    }
}
