use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::join_all;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{error, info};

use super::{
    player::{GuildPlayer, LoopExit, PlayerSettings},
    voice::Announcer,
};

/// Guild id -> playback state. Owned by the bot and passed by reference to
/// the command handlers; one [`GuildPlayer`] per guild at a time.
pub struct GuildRegistry {
    players: Arc<DashMap<GuildId, Arc<GuildPlayer>>>,
    settings: PlayerSettings,
    announcer: Arc<dyn Announcer>,
}

impl GuildRegistry {
    pub fn new(settings: PlayerSettings, announcer: Arc<dyn Announcer>) -> Self {
        Self {
            players: Arc::new(DashMap::new()),
            settings,
            announcer,
        }
    }

    /// Existing player for the guild, or a fresh one with its loop running.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        let player = match self.players.entry(guild_id) {
            Entry::Occupied(entry) if !entry.get().is_closed() => return entry.get().clone(),
            Entry::Occupied(mut entry) => {
                let player = self.build(guild_id);
                entry.insert(player.clone());
                player
            }
            Entry::Vacant(entry) => {
                let player = self.build(guild_id);
                entry.insert(player.clone());
                player
            }
        };

        self.watch(player.clone());
        info!("🆕 Playback state created for guild {}", guild_id);
        player
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players
            .get(&guild_id)
            .map(|entry| entry.clone())
            .filter(|player| !player.is_closed())
    }

    /// Stops the guild's player and forgets it. False if there was none.
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        let removed = self.players.remove(&guild_id);
        match removed {
            Some((_, player)) => {
                player.stop().await;
                info!("🗑️ Playback state removed for guild {}", guild_id);
                true
            }
            None => false,
        }
    }

    /// Stops every player; used on shutdown.
    pub async fn shutdown(&self) {
        if self.is_empty() {
            return;
        }
        info!("Stopping {} guild players", self.len());
        let guilds: Vec<GuildId> = self.players.iter().map(|entry| *entry.key()).collect();
        join_all(guilds.into_iter().map(|guild_id| self.remove(guild_id))).await;
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn build(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        Arc::new(GuildPlayer::new(guild_id, self.settings, self.announcer.clone()))
    }

    /// Starts the player's loop and drops the map entry once it idles out.
    fn watch(&self, player: Arc<GuildPlayer>) {
        let task = match player.start() {
            Ok(task) => task,
            Err(e) => {
                error!("Playback loop for guild {} not started: {}", player.guild_id(), e);
                return;
            }
        };
        let players = Arc::clone(&self.players);

        tokio::spawn(async move {
            let guild_id = player.guild_id();
            match task.await {
                Ok(LoopExit::IdleTimeout) => {
                    players.remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &player));
                    info!("💤 Guild {} released after idle timeout", guild_id);
                }
                Ok(LoopExit::Cancelled) => {}
                Err(e) => {
                    error!("❌ Playback loop for guild {} crashed: {:?}", guild_id, e);
                    players.remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &player));
                    player.stop().await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{track, FakeVoice, RecordingAnnouncer};
    use std::time::Duration;

    fn registry() -> GuildRegistry {
        GuildRegistry::new(
            PlayerSettings::default(),
            Arc::new(RecordingAnnouncer::default()),
        )
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_state() {
        let registry = registry();
        let first = registry.get_or_create(GuildId::new(1));
        let second = registry.get_or_create(GuildId::new(1));
        let other = registry.get_or_create(GuildId::new(2));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_then_recreate() {
        let registry = registry();
        let first = registry.get_or_create(GuildId::new(1));
        let (voice, _played) = FakeVoice::new();
        first.attach_voice(voice.clone()).unwrap();
        first.queue().append(track("pending", 1)).unwrap();
        first.queue().append(track("pending-2", 1)).unwrap();

        assert!(registry.remove(GuildId::new(1)).await);
        assert!(voice.is_disconnected());
        assert!(first.is_closed());
        assert!(registry.get(GuildId::new(1)).is_none());
        assert!(!registry.remove(GuildId::new(1)).await);

        let second = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_guild_is_released() {
        let registry = registry();
        let player = registry.get_or_create(GuildId::new(1));
        let (voice, _played) = FakeVoice::new();
        player.attach_voice(voice.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(181)).await;
        // Let the watcher observe the loop exit.
        tokio::task::yield_now().await;

        assert!(voice.is_disconnected());
        assert!(registry.is_empty());

        let fresh = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&player, &fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_for_idled_guild_goes_to_fresh_player() {
        let registry = registry();
        let stale = registry.get_or_create(GuildId::new(1));
        let (voice, _played) = FakeVoice::new();
        stale.attach_voice(voice.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(181)).await;
        tokio::task::yield_now().await;

        assert!(matches!(
            stale.enqueue(track("late", 1)),
            Err(crate::error::PlayerError::Closed)
        ));

        let fresh = registry.get_or_create(GuildId::new(1));
        let (fresh_voice, mut played) = FakeVoice::new();
        fresh.attach_voice(fresh_voice).unwrap();
        fresh.enqueue(track("late", 1)).unwrap();

        let started = tokio::time::timeout(Duration::from_secs(5), played.recv())
            .await
            .unwrap();
        assert_eq!(started.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_guild() {
        let registry = registry();
        let mut voices = Vec::new();
        for id in 1..=3 {
            let player = registry.get_or_create(GuildId::new(id));
            let (voice, _played) = FakeVoice::new();
            player.attach_voice(voice.clone()).unwrap();
            voices.push(voice);
        }

        registry.shutdown().await;

        assert!(registry.is_empty());
        assert!(voices.iter().all(|voice| voice.disconnect_count() == 1));
    }

    #[tokio::test]
    async fn test_closed_player_is_replaced() {
        let registry = registry();
        let first = registry.get_or_create(GuildId::new(1));
        first.stop().await;

        let second = registry.get_or_create(GuildId::new(1));
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_closed());
    }
}
