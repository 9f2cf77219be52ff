use async_trait::async_trait;

use super::imdb::ImdbSuggestion;
use super::omdb::OmdbMovie;
use super::tmdb::TmdbMovie;
use crate::error::SourceError;
use crate::models::{ImagePayload, ImageReference, Listing, SearchQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Search,
    FetchById,
    FetchImage,
    List,
}

/// Provider payload before normalization, one variant per provider shape
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Tmdb(TmdbMovie),
    Omdb(OmdbMovie),
    Imdb(ImdbSuggestion),
}

/// One external provider.
///
/// Every call is bounded by the HTTP client's timeout and retried by the
/// shared [`RetryPolicy`](super::retry::RetryPolicy) on transient failures.
/// "Nothing found" is `Ok(vec![])` / `Ok(None)`, never an error. Capabilities
/// an adapter does not advertise answer [`SourceError::Unsupported`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &'static [Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// False when a required credential is missing; the pipelines skip it
    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawRecord>, SourceError> {
        Err(SourceError::Unsupported)
    }

    /// Look up a canonical id (`tmdb:155`, `imdb:tt0468569`). Ids from
    /// another namespace are `Ok(None)`.
    async fn fetch_by_id(&self, _id: &str) -> Result<Option<RawRecord>, SourceError> {
        Err(SourceError::Unsupported)
    }

    async fn list(&self, _listing: &Listing, _limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        Err(SourceError::Unsupported)
    }

    async fn fetch_image(
        &self,
        _reference: &ImageReference,
    ) -> Result<Option<ImagePayload>, SourceError> {
        Err(SourceError::Unsupported)
    }
}

/// Split a canonical id into namespace and provider-local id
pub fn split_id(id: &str) -> Option<(&str, &str)> {
    let (namespace, local) = id.trim().split_once(':')?;
    let local = local.trim();
    if namespace.is_empty() || local.is_empty() {
        return None;
    }
    Some((namespace, local))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted adapter with a call counter
    pub(crate) struct StubAdapter {
        pub name: &'static str,
        pub capabilities: &'static [Capability],
        pub available: bool,
        pub delay: Option<Duration>,
        pub records: Result<Vec<RawRecord>, SourceError>,
        pub image: Result<Option<ImagePayload>, SourceError>,
        /// Answer image lookups only for references with a movie id
        pub needs_movie_id: bool,
        /// Shared log of adapter names in call order
        pub call_log: Option<Arc<Mutex<Vec<&'static str>>>>,
        pub calls: AtomicUsize,
        pub seen_ids: Mutex<Vec<String>>,
    }

    pub(crate) const METADATA_CAPS: &[Capability] = &[
        Capability::Search,
        Capability::FetchById,
        Capability::List,
    ];

    pub(crate) const IMAGE_CAPS: &[Capability] = &[Capability::FetchImage];

    pub(crate) const ALL_CAPS: &[Capability] = &[
        Capability::Search,
        Capability::FetchById,
        Capability::List,
        Capability::FetchImage,
    ];

    impl StubAdapter {
        pub(crate) fn returning(name: &'static str, records: Vec<RawRecord>) -> Self {
            Self {
                name,
                capabilities: METADATA_CAPS,
                available: true,
                delay: None,
                records: Ok(records),
                image: Ok(None),
                needs_movie_id: false,
                call_log: None,
                calls: AtomicUsize::new(0),
                seen_ids: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(name: &'static str, error: SourceError) -> Self {
            Self {
                capabilities: ALL_CAPS,
                records: Err(error.clone()),
                image: Err(error),
                ..Self::returning(name, vec![])
            }
        }

        pub(crate) fn image(name: &'static str, payload: Option<ImagePayload>) -> Self {
            Self {
                capabilities: IMAGE_CAPS,
                image: Ok(payload),
                ..Self::returning(name, vec![])
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn logging_to(mut self, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
            self.call_log = Some(log);
            self
        }

        pub(crate) fn requiring_movie_id(mut self) -> Self {
            self.needs_movie_id = true;
            self
        }

        pub(crate) fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn enter(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = &self.call_log {
                log.lock().unwrap().push(self.name);
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capabilities(&self) -> &'static [Capability] {
            self.capabilities
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawRecord>, SourceError> {
            self.enter().await;
            self.records.clone()
        }

        async fn fetch_by_id(&self, id: &str) -> Result<Option<RawRecord>, SourceError> {
            self.enter().await;
            if let Ok(mut seen) = self.seen_ids.lock() {
                seen.push(id.to_string());
            }
            self.records.clone().map(|records| records.into_iter().next())
        }

        async fn list(&self, _listing: &Listing, _limit: usize) -> Result<Vec<RawRecord>, SourceError> {
            self.enter().await;
            self.records.clone()
        }

        async fn fetch_image(
            &self,
            reference: &ImageReference,
        ) -> Result<Option<ImagePayload>, SourceError> {
            self.enter().await;
            if self.needs_movie_id && reference.movie_id.is_none() {
                return Ok(None);
            }
            self.image.clone()
        }
    }

    pub(crate) fn adapters(list: Vec<Arc<StubAdapter>>) -> Vec<Arc<dyn SourceAdapter>> {
        list.into_iter()
            .map(|adapter| adapter as Arc<dyn SourceAdapter>)
            .collect()
    }

    #[test]
    fn test_split_id() {
        assert_eq!(split_id("tmdb:155"), Some(("tmdb", "155")));
        assert_eq!(split_id("imdb:tt0468569"), Some(("imdb", "tt0468569")));
        assert_eq!(split_id("155"), None);
        assert_eq!(split_id("tmdb:"), None);
    }

    #[tokio::test]
    async fn test_default_capabilities_are_unsupported() {
        struct Bare;

        #[async_trait]
        impl SourceAdapter for Bare {
            fn name(&self) -> &'static str {
                "bare"
            }
            fn capabilities(&self) -> &'static [Capability] {
                &[]
            }
        }

        let query = SearchQuery::with_default_limit("alien").unwrap();
        assert_eq!(Bare.search(&query).await, Err(SourceError::Unsupported));
        assert_eq!(Bare.fetch_by_id("tmdb:1").await, Err(SourceError::Unsupported));
        assert!(!Bare.supports(Capability::Search));
        assert!(Bare.is_available());
    }
}
