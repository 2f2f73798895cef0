pub mod resolver;
pub mod ytdlp;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;

use crate::error::ResolutionError;

pub use resolver::TrackResolver;
pub use ytdlp::YtDlpExtractor;

/// Media-extraction backend.
///
/// `process == false` is a cheap lookup: search results and playlists come
/// back as flat collections without format selection. `process == true`
/// fully resolves the query so the returned entry carries a direct stream URL.
/// `Ok(None)` means the backend produced nothing for the query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn extract(&self, query: &str, process: bool)
        -> Result<Option<Descriptor>, ResolutionError>;
}

/// Raw backend output: either a single entry or a collection of entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Descriptor {
    pub entries: Option<Vec<Option<Descriptor>>>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub uploader_url: Option<String>,
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub webpage_url: Option<String>,
    pub url: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub dislike_count: Option<u64>,
}

impl Descriptor {
    pub fn is_collection(&self) -> bool {
        self.entries.is_some()
    }

    /// Canonical page URL; flat search entries only carry `url`.
    pub fn page_url(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.url.as_deref())
    }
}

/// Fully-resolved, playable track. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub uploader: String,
    pub uploader_url: Option<String>,
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub duration_secs: u64,
    pub duration: String,
    pub tags: Vec<String>,
    pub url: String,
    pub views: Option<u64>,
    pub likes: Option<u64>,
    pub dislikes: Option<u64>,
    pub stream_url: String,
}

impl TrackMetadata {
    pub fn from_descriptor(info: Descriptor) -> Result<Self, ResolutionError> {
        let url = info.webpage_url.clone().unwrap_or_default();
        let stream_url = info
            .url
            .ok_or_else(|| ResolutionError::FetchFailed(url.clone()))?;
        let duration_secs = info.duration.map(|d| d.max(0.0) as u64).unwrap_or(0);

        Ok(Self {
            title: info.title.unwrap_or_else(|| "Unknown title".to_string()),
            uploader: info.uploader.unwrap_or_else(|| "Unknown".to_string()),
            uploader_url: info.uploader_url,
            upload_date: info.upload_date.as_deref().and_then(format_upload_date),
            thumbnail: info.thumbnail,
            description: info.description,
            duration_secs,
            duration: format_duration(duration_secs),
            tags: info.tags.unwrap_or_default(),
            url,
            views: info.view_count,
            likes: info.like_count,
            dislikes: info.dislike_count,
            stream_url,
        })
    }
}

impl fmt::Display for TrackMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**{}** by **{}**", self.title, self.uploader)
    }
}

/// Human readable duration, e.g. `1 days, 1 hours, 1 minutes, 1 seconds`.
/// Zero-valued units are left out, so a zero duration is an empty string.
pub fn format_duration(total_secs: u64) -> String {
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);

    [(days, "days"), (hours, "hours"), (minutes, "minutes"), (seconds, "seconds")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{} {}", value, unit))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `YYYYMMDD` -> `DD.MM.YYYY`.
pub fn format_upload_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .ok()
        .map(|date| date.format("%d.%m.%Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "");
        assert_eq!(format_duration(65), "1 minutes, 5 seconds");
        assert_eq!(format_duration(90061), "1 days, 1 hours, 1 minutes, 1 seconds");
        assert_eq!(format_duration(3600), "1 hours");
        assert_eq!(format_duration(86_400 + 30), "1 days, 30 seconds");
    }

    #[test]
    fn test_upload_date() {
        assert_eq!(format_upload_date("20091025").as_deref(), Some("25.10.2009"));
        assert_eq!(format_upload_date("2009-10-25"), None);
    }

    #[test]
    fn test_metadata_from_descriptor() {
        let info: Descriptor = serde_json::from_value(serde_json::json!({
            "title": "Never Gonna Give You Up",
            "uploader": "Rick Astley",
            "uploader_url": "https://www.youtube.com/@RickAstleyYT",
            "upload_date": "20091025",
            "duration": 213.0,
            "tags": ["rick", "astley"],
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "url": "https://rr1.googlevideo.com/videoplayback?id=1",
            "view_count": 1000,
        }))
        .unwrap();

        let track = TrackMetadata::from_descriptor(info).unwrap();
        assert_eq!(track.duration, "3 minutes, 33 seconds");
        assert_eq!(track.upload_date.as_deref(), Some("25.10.2009"));
        assert_eq!(track.tags, vec!["rick".to_string(), "astley".to_string()]);
        assert_eq!(track.likes, None);
        assert_eq!(
            track.to_string(),
            "**Never Gonna Give You Up** by **Rick Astley**"
        );
    }

    #[test]
    fn test_missing_optional_fields_deserialize_as_none() {
        let info: Descriptor = serde_json::from_value(serde_json::json!({
            "title": "Untagged",
            "url": "https://example.com/stream",
        }))
        .unwrap();

        assert!(!info.is_collection());
        assert!(info.entries.is_none());
        assert_eq!(info.tags, None);
        assert_eq!(info.duration, None);
    }

    #[test]
    fn test_metadata_requires_stream_url() {
        let info = Descriptor {
            webpage_url: Some("https://example.com/watch".into()),
            ..Default::default()
        };
        assert!(matches!(
            TrackMetadata::from_descriptor(info),
            Err(ResolutionError::FetchFailed(_))
        ));
    }
}
