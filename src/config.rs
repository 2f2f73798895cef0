use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::audio::player::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Commands registered on this guild only

    // Playback
    pub default_volume: f32,
    pub idle_timeout_secs: u64,
    pub skip_vote_threshold: usize,
    pub queue_page_size: usize,

    // Media backend
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from a key lookup, falling back to
    /// [`Config::default`] for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            discord_token: lookup("DISCORD_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .context("DISCORD_TOKEN must be set")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            default_volume: parse_or(&lookup, "DEFAULT_VOLUME", defaults.default_volume)?,
            idle_timeout_secs: parse_or(&lookup, "IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
            skip_vote_threshold: parse_or(
                &lookup,
                "SKIP_VOTE_THRESHOLD",
                defaults.skip_vote_threshold,
            )?,
            queue_page_size: parse_or(&lookup, "QUEUE_PAGE_SIZE", defaults.queue_page_size)?,

            ytdlp_path: lookup("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        };

        config.validate()?;

        Ok(config)
    }

    /// Rejects values the bot cannot work with.
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Timeout, vote threshold and page size must be greater than 0
    /// - The backend path must not be empty
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.skip_vote_threshold == 0 {
            anyhow::bail!("Skip vote threshold must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH must not be empty");
        }

        Ok(())
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            default_volume: self.default_volume,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            skip_threshold: self.skip_vote_threshold,
        }
    }

    /// Summary for the startup log. Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Playback: {}% vol, {}s idle timeout, {} votes to skip\n  \
            Queue: {} items per page\n  \
            Backend: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("on guild {}", id)),
            (self.default_volume * 100.0).round() as u32,
            self.idle_timeout_secs,
            self.skip_vote_threshold,
            self.queue_page_size,
            self.ytdlp_path
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 0.5,
            idle_timeout_secs: 180,
            skip_vote_threshold: 3,
            queue_page_size: 10,

            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = load(&[("DISCORD_TOKEN", "secret")]).unwrap();

        assert_eq!(config.discord_token, "secret");
        assert_eq!(config.guild_id, None);
        assert_eq!(config.default_volume, 0.5);
        assert_eq!(config.idle_timeout_secs, 180);
        assert_eq!(config.skip_vote_threshold, 3);
        assert_eq!(config.queue_page_size, 10);
        assert_eq!(config.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn test_token_is_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = load(&[
            ("DISCORD_TOKEN", "secret"),
            ("GUILD_ID", "1234"),
            ("DEFAULT_VOLUME", "0.8"),
            ("IDLE_TIMEOUT_SECS", "60"),
            ("SKIP_VOTE_THRESHOLD", "5"),
            ("QUEUE_PAGE_SIZE", "20"),
            ("YTDLP_PATH", "/usr/local/bin/yt-dlp"),
        ])
        .unwrap();

        assert_eq!(config.guild_id, Some(1234));
        assert_eq!(config.default_volume, 0.8);
        assert_eq!(config.idle_timeout_secs, 60);
        assert_eq!(config.skip_vote_threshold, 5);
        assert_eq!(config.queue_page_size, 20);
        assert_eq!(config.ytdlp_path, "/usr/local/bin/yt-dlp");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("DISCORD_TOKEN", "t"), ("DEFAULT_VOLUME", "1.5")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("DEFAULT_VOLUME", "loud")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("IDLE_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("SKIP_VOTE_THRESHOLD", "0")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "t"), ("QUEUE_PAGE_SIZE", "0")]).is_err());
    }

    #[test]
    fn test_player_settings_follow_config() {
        let config = Config {
            default_volume: 0.25,
            idle_timeout_secs: 30,
            skip_vote_threshold: 2,
            ..Config::default()
        };
        let settings = config.player_settings();

        assert_eq!(settings.default_volume, 0.25);
        assert_eq!(settings.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.skip_threshold, 2);
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            guild_id: Some(42),
            ..Config::default()
        };
        let summary = config.summary();

        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("on guild 42"));
        assert!(summary.contains("50% vol"));
    }
}
