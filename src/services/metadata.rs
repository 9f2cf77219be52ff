use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use super::images::ImagePipeline;
use super::normalize::{normalize, normalize_all};
use super::single_flight::SingleFlight;
use super::source::{Capability, RawRecord, SourceAdapter};
use crate::cache::{CacheCategory, CacheStats, TieredCache, TtlPolicy};
use crate::error::{QueryError, SourceError};
use crate::models::{CanonicalMovie, ImageReference, Listing, SearchQuery};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorOptions {
    /// Deadline for one whole fallback walk; what was gathered by then is
    /// returned
    pub request_timeout: Duration,
    /// Fill short search results with distinct records from lower-priority
    /// providers
    pub merge_search: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            merge_search: true,
        }
    }
}

/// Result of one fallback walk. `complete` is false when the deadline cut
/// the walk short; such results are returned but never cached.
struct Walk<T> {
    value: T,
    complete: bool,
}

trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn is_empty_result(&self) -> bool;
}

impl Cacheable for Vec<CanonicalMovie> {
    fn is_empty_result(&self) -> bool {
        self.is_empty()
    }
}

impl Cacheable for Option<CanonicalMovie> {
    fn is_empty_result(&self) -> bool {
        self.is_none()
    }
}

/// The same film listed under two id namespaces shares title and year.
/// Records without a year only dedup by id.
fn title_key(movie: &CanonicalMovie) -> Option<String> {
    let year = movie.year?;
    let title: String = movie
        .title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    Some(format!("{}:{}", title, year))
}

/// Ordered, deduplicated result set; earlier (higher priority) records win
struct Merged {
    movies: Vec<CanonicalMovie>,
    seen_ids: HashSet<String>,
    seen_titles: HashSet<String>,
    limit: usize,
}

impl Merged {
    fn new(limit: usize) -> Self {
        Self {
            movies: Vec::new(),
            seen_ids: HashSet::new(),
            seen_titles: HashSet::new(),
            limit,
        }
    }

    /// Returns how many records were new
    fn extend(&mut self, movies: Vec<CanonicalMovie>) -> usize {
        let before = self.movies.len();
        for movie in movies {
            if self.is_full() {
                break;
            }
            let title = title_key(&movie);
            let duplicate = self.seen_ids.contains(&movie.id)
                || title.as_ref().is_some_and(|t| self.seen_titles.contains(t));
            if duplicate {
                continue;
            }

            self.seen_ids.insert(movie.id.clone());
            if let Some(title) = title {
                self.seen_titles.insert(title);
            }
            self.movies.push(movie);
        }
        self.movies.len() - before
    }

    fn is_full(&self) -> bool {
        self.movies.len() >= self.limit
    }
}

/// What a list-style walk asks each adapter for
#[derive(Clone, Copy)]
enum ListCall<'a> {
    Search(&'a SearchQuery),
    Listing(&'a Listing, usize),
}

impl ListCall<'_> {
    fn capability(&self) -> Capability {
        match self {
            ListCall::Search(_) => Capability::Search,
            ListCall::Listing(..) => Capability::List,
        }
    }

    fn limit(&self) -> usize {
        match self {
            ListCall::Search(query) => query.limit(),
            ListCall::Listing(_, limit) => *limit,
        }
    }

    async fn invoke(&self, adapter: &dyn SourceAdapter) -> Result<Vec<RawRecord>, SourceError> {
        match self {
            ListCall::Search(query) => adapter.search(query).await,
            ListCall::Listing(listing, limit) => adapter.list(listing, *limit).await,
        }
    }
}

/// Provider-fallback aggregator in front of the tiered cache.
///
/// Adapters are tried in the order given; the cache is consulted first and
/// written only with non-empty results of a walk that finished before the
/// deadline. Provider failures never surface to callers: when every adapter
/// fails the answer is empty.
pub struct MetadataService {
    cache: Arc<TieredCache>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    ttl: TtlPolicy,
    options: AggregatorOptions,
    images: Option<Arc<ImagePipeline>>,
    list_flights: SingleFlight<Vec<CanonicalMovie>>,
    detail_flights: SingleFlight<Option<CanonicalMovie>>,
}

impl MetadataService {
    pub fn new(
        cache: Arc<TieredCache>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        ttl: TtlPolicy,
        options: AggregatorOptions,
    ) -> Self {
        for adapter in &adapters {
            if adapter.is_available() {
                tracing::info!("Metadata provider enabled: {}", adapter.name());
            } else {
                tracing::info!("Metadata provider disabled (no credentials): {}", adapter.name());
            }
        }

        Self {
            cache,
            adapters,
            ttl,
            options,
            images: None,
            list_flights: SingleFlight::new(),
            detail_flights: SingleFlight::new(),
        }
    }

    pub fn with_image_pipeline(mut self, images: Arc<ImagePipeline>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn has_available_provider(&self) -> bool {
        self.adapters.iter().any(|a| a.is_available())
    }

    /// Search across providers
    pub async fn search(&self, query: &SearchQuery) -> Vec<CanonicalMovie> {
        let key = format!("search:{}:{}", query.normalized_text(), query.limit());
        let ttl = self.ttl.ttl_for(CacheCategory::Search);
        let merge = self.options.merge_search;
        self.read_through(&self.list_flights, &key, ttl, || {
            self.walk_list(ListCall::Search(query), merge)
        })
        .await
    }

    /// Type-ahead suggestions. First usable provider wins, no merging.
    pub async fn suggestions(&self, query: &SearchQuery) -> Vec<CanonicalMovie> {
        let key = format!("suggest:{}:{}", query.normalized_text(), query.limit());
        let ttl = self.ttl.ttl_for(CacheCategory::Suggestions);
        self.read_through(&self.list_flights, &key, ttl, || {
            self.walk_list(ListCall::Search(query), false)
        })
        .await
    }

    pub async fn popular(&self, limit: usize) -> Vec<CanonicalMovie> {
        self.listing(&Listing::Popular, limit, CacheCategory::Popular)
            .await
    }

    pub async fn trending(&self, limit: usize) -> Vec<CanonicalMovie> {
        self.listing(&Listing::Trending, limit, CacheCategory::Trending)
            .await
    }

    pub async fn by_genre(&self, genre: &str, limit: usize) -> Result<Vec<CanonicalMovie>, QueryError> {
        let genre = genre.trim();
        if genre.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let listing = Listing::Genre(genre.to_string());
        Ok(self.listing(&listing, limit, CacheCategory::Genre).await)
    }

    async fn listing(
        &self,
        listing: &Listing,
        limit: usize,
        category: CacheCategory,
    ) -> Vec<CanonicalMovie> {
        let key = listing.cache_key(limit);
        let ttl = self.ttl.ttl_for(category);
        self.read_through(&self.list_flights, &key, ttl, || {
            self.walk_list(ListCall::Listing(listing, limit), true)
        })
        .await
    }

    /// Details for one canonical id. Stops at the first provider that
    /// knows the id; records are never merged.
    pub async fn movie_detail(&self, id: &str) -> Result<Option<CanonicalMovie>, QueryError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(QueryError::EmptyId);
        }
        let key = format!("movie:{}", id);
        let ttl = self.ttl.ttl_for(CacheCategory::MovieDetail);
        Ok(self
            .read_through(&self.detail_flights, &key, ttl, || self.walk_detail(id))
            .await)
    }

    /// Replace every poster with the URL the image pipeline resolves, or
    /// drop it when no artwork tier has one. Without a pipeline the records
    /// are returned as they are.
    pub async fn attach_artwork(&self, movies: Vec<CanonicalMovie>) -> Vec<CanonicalMovie> {
        let Some(ref images) = self.images else {
            return movies;
        };

        let resolved = join_all(
            movies
                .iter()
                .map(|movie| async move { images.resolve(&ImageReference::for_movie(movie)).await }),
        )
        .await;

        movies
            .iter()
            .zip(resolved)
            .map(|(movie, image)| movie.with_poster(image.map(|i| i.resolved_url)))
            .collect()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn eligible(&self, capability: Capability) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .filter(move |a| a.is_available() && a.supports(capability))
    }

    /// Cache check, then one shared walk per key. Only the walk's leader
    /// writes the cache.
    async fn read_through<T, F, Fut>(
        &self,
        flights: &SingleFlight<T>,
        key: &str,
        ttl: Duration,
        walk: F,
    ) -> T
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Walk<T>>,
    {
        if let Some(hit) = self.cache.get_json::<T>(key).await {
            tracing::debug!("Cache hit: {}", key);
            return hit;
        }

        flights
            .run(key, || async move {
                let outcome = walk().await;
                if !outcome.complete {
                    tracing::debug!("Not caching {}: deadline reached", key);
                } else if outcome.value.is_empty_result() {
                    tracing::debug!("Not caching {}: empty result", key);
                } else if let Err(e) = self.cache.set_json(key, &outcome.value, ttl).await {
                    tracing::warn!("Failed to cache {}: {}", key, e);
                }
                outcome.value
            })
            .await
    }

    async fn walk_list(&self, call: ListCall<'_>, merge: bool) -> Walk<Vec<CanonicalMovie>> {
        let deadline = Instant::now() + self.options.request_timeout;
        let mut merged = Merged::new(call.limit());

        for adapter in self.eligible(call.capability()) {
            let name = adapter.name();
            let records = match timeout_at(deadline, call.invoke(adapter.as_ref())).await {
                Err(_) => {
                    tracing::warn!(
                        "Request deadline reached at {}, returning {} results",
                        name,
                        merged.movies.len()
                    );
                    return Walk {
                        value: merged.movies,
                        complete: false,
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!("{} failed, trying next provider: {}", name, e);
                    continue;
                }
                Ok(Ok(records)) => records,
            };

            let movies = normalize_all(records, name);
            if movies.is_empty() {
                tracing::debug!("{} returned no usable records", name);
                continue;
            }

            let added = merged.extend(movies);
            tracing::debug!("{} contributed {} records", name, added);

            if !merge || merged.is_full() {
                break;
            }
        }

        Walk {
            value: merged.movies,
            complete: true,
        }
    }

    async fn walk_detail(&self, id: &str) -> Walk<Option<CanonicalMovie>> {
        let deadline = Instant::now() + self.options.request_timeout;

        for adapter in self.eligible(Capability::FetchById) {
            let name = adapter.name();
            match timeout_at(deadline, adapter.fetch_by_id(id)).await {
                Err(_) => {
                    tracing::warn!("Request deadline reached at {} looking up {}", name, id);
                    return Walk {
                        value: None,
                        complete: false,
                    };
                }
                Ok(Ok(Some(record))) => match normalize(record, name) {
                    Ok(movie) => {
                        return Walk {
                            value: Some(movie),
                            complete: true,
                        }
                    }
                    Err(e) => tracing::debug!("{}: dropping {}: {}", name, id, e),
                },
                Ok(Ok(None)) => tracing::debug!("{} does not know {}", name, id),
                Ok(Err(e)) => tracing::warn!("{} lookup of {} failed: {}", name, id, e),
            }
        }

        Walk {
            value: None,
            complete: true,
        }
    }
}
