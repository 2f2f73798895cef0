//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`queue`] - Track Queue
//! - Pending tracks of one guild, FIFO
//! - Many producers (commands), one consumer (the playback loop)
//! - Blocking pop with timeout, paging, remove, shuffle
//!
//! ### [`player`] - Playback State Machine
//! - One long-lived loop per guild: pop -> play -> wait for end -> advance
//! - Loop, volume, skip votes, pause/resume
//! - Idle timeout disconnects after 180s without a new track
//!
//! ### [`registry`] - Guild Registry
//! - Lazily creates one player per guild and starts its loop
//! - Drops players on leave or idle timeout
//!
//! ### [`voice`] - Platform seams
//! - [`voice::VoiceConnection`] and [`voice::Announcer`], implemented on
//!   songbird/serenity in [`crate::bot`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kronos_music::audio::{player::PlayerSettings, registry::GuildRegistry};
//! use serenity::all::GuildId;
//!
//! # fn example(announcer: std::sync::Arc<dyn kronos_music::audio::voice::Announcer>) {
//! let registry = GuildRegistry::new(PlayerSettings::default(), announcer);
//! let player = registry.get_or_create(GuildId::new(123456789));
//! assert!(player.queue().is_empty());
//! # }
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;
