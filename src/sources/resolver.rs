use std::sync::Arc;
use tracing::{debug, info};

use super::{Descriptor, MediaExtractor, TrackMetadata};
use crate::error::ResolutionError;

/// Turns a raw search term or URL into a fully-resolved [`TrackMetadata`].
///
/// Holds no shared state beyond the backend handle, so resolutions for
/// different guilds and users run concurrently.
#[derive(Clone)]
pub struct TrackResolver {
    backend: Arc<dyn MediaExtractor>,
}

impl TrackResolver {
    pub fn new(backend: Arc<dyn MediaExtractor>) -> Self {
        Self { backend }
    }

    pub async fn resolve(&self, search: &str) -> Result<TrackMetadata, ResolutionError> {
        info!("🔍 Resolving: {}", search);

        // Cheap lookup first: search results come back as a flat collection.
        let data = self
            .backend
            .extract(search, false)
            .await?
            .ok_or_else(|| ResolutionError::NotFound(search.to_string()))?;

        let page_url = if data.is_collection() {
            first_present(data.entries.unwrap_or_default())
                .and_then(|entry| entry.page_url().map(str::to_string))
                .ok_or_else(|| ResolutionError::NotFound(search.to_string()))?
        } else {
            data.page_url()
                .map(str::to_string)
                .ok_or_else(|| ResolutionError::NotFound(search.to_string()))?
        };
        debug!("Selected entry: {}", page_url);

        let processed = self
            .backend
            .extract(&page_url, true)
            .await?
            .ok_or_else(|| ResolutionError::FetchFailed(page_url.clone()))?;

        let info = if processed.is_collection() {
            first_present(processed.entries.unwrap_or_default())
                .ok_or_else(|| ResolutionError::NotFound(page_url.clone()))?
        } else {
            processed
        };

        let track = TrackMetadata::from_descriptor(info)?;
        info!("✅ Resolved: {} ({})", track.title, track.url);
        Ok(track)
    }
}

/// First entry that is actually present; backends report unavailable items as nulls.
fn first_present(entries: Vec<Option<Descriptor>>) -> Option<Descriptor> {
    entries.into_iter().flatten().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockMediaExtractor;

    fn entry(page: &str, stream: Option<&str>) -> Descriptor {
        Descriptor {
            title: Some("Song".into()),
            uploader: Some("Band".into()),
            duration: Some(65.0),
            webpage_url: Some(page.into()),
            url: stream.map(str::to_string),
            ..Default::default()
        }
    }

    fn collection(entries: Vec<Option<Descriptor>>) -> Descriptor {
        Descriptor {
            entries: Some(entries),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_search_skips_missing_entries() {
        let mut backend = MockMediaExtractor::new();
        backend
            .expect_extract()
            .withf(|query, process| query == "lofi beats" && !*process)
            .times(1)
            .returning(|_, _| {
                Ok(Some(collection(vec![
                    None,
                    Some(entry("https://yt/watch?v=a", None)),
                    Some(entry("https://yt/watch?v=b", None)),
                ])))
            });
        backend
            .expect_extract()
            .withf(|query, process| query == "https://yt/watch?v=a" && *process)
            .times(1)
            .returning(|_, _| Ok(Some(entry("https://yt/watch?v=a", Some("https://cdn/a")))));

        let resolver = TrackResolver::new(Arc::new(backend));
        let track = resolver.resolve("lofi beats").await.unwrap();

        assert_eq!(track.url, "https://yt/watch?v=a");
        assert_eq!(track.stream_url, "https://cdn/a");
        assert_eq!(track.duration, "1 minutes, 5 seconds");
    }

    #[tokio::test]
    async fn test_resolve_nothing_found() {
        let mut backend = MockMediaExtractor::new();
        backend.expect_extract().returning(|_, _| Ok(None));

        let resolver = TrackResolver::new(Arc::new(backend));
        let err = resolver.resolve("zzz").await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(q) if q == "zzz"));
    }

    #[tokio::test]
    async fn test_resolve_collection_without_usable_entries() {
        let mut backend = MockMediaExtractor::new();
        backend
            .expect_extract()
            .withf(|query, process| query == "zzz" && !*process)
            .returning(|_, _| Ok(Some(collection(vec![None, None]))));

        let resolver = TrackResolver::new(Arc::new(backend));
        assert!(matches!(
            resolver.resolve("zzz").await,
            Err(ResolutionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_second_lookup_fails() {
        let mut backend = MockMediaExtractor::new();
        backend
            .expect_extract()
            .withf(|query, process| query == "https://yt/watch?v=a" && !*process)
            .returning(|_, _| Ok(Some(entry("https://yt/watch?v=a", None))));
        backend
            .expect_extract()
            .withf(|query, process| query == "https://yt/watch?v=a" && *process)
            .returning(|_, _| Ok(None));

        let resolver = TrackResolver::new(Arc::new(backend));
        assert!(matches!(
            resolver.resolve("https://yt/watch?v=a").await,
            Err(ResolutionError::FetchFailed(url)) if url == "https://yt/watch?v=a"
        ));
    }

    #[tokio::test]
    async fn test_resolve_processed_collection_takes_first() {
        let mut backend = MockMediaExtractor::new();
        backend
            .expect_extract()
            .withf(|query, process| query == "https://yt/playlist?list=x" && !*process)
            .returning(|_, _| Ok(Some(entry("https://yt/playlist?list=x", None))));
        backend
            .expect_extract()
            .withf(|query, process| query == "https://yt/playlist?list=x" && *process)
            .returning(|_, _| {
                Ok(Some(collection(vec![
                    Some(entry("https://yt/watch?v=1", Some("https://cdn/1"))),
                    Some(entry("https://yt/watch?v=2", Some("https://cdn/2"))),
                ])))
            });

        let resolver = TrackResolver::new(Arc::new(backend));
        let track = resolver.resolve("https://yt/playlist?list=x").await.unwrap();
        assert_eq!(track.stream_url, "https://cdn/1");
    }

    #[tokio::test]
    async fn test_resolve_processed_collection_empty() {
        let mut backend = MockMediaExtractor::new();
        backend
            .expect_extract()
            .withf(|query, process| query == "q" && !*process)
            .returning(|_, _| Ok(Some(entry("https://yt/watch?v=q", None))));
        backend
            .expect_extract()
            .withf(|query, process| query == "https://yt/watch?v=q" && *process)
            .returning(|_, _| Ok(Some(collection(Vec::new()))));

        let resolver = TrackResolver::new(Arc::new(backend));
        assert!(matches!(
            resolver.resolve("q").await,
            Err(ResolutionError::NotFound(_))
        ));
    }
}
