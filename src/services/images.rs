// Image resolution pipeline: walk the artwork tiers in priority order and
// cache whichever answers first.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use super::metadata::DEFAULT_REQUEST_TIMEOUT;
use super::single_flight::SingleFlight;
use super::source::{Capability, SourceAdapter};
use crate::cache::TieredCache;
use crate::models::{ImageReference, ResolvedImage};

pub struct ImagePipeline {
    cache: Arc<TieredCache>,
    tiers: Vec<Arc<dyn SourceAdapter>>,
    ttl: Duration,
    /// Deadline for one whole tier walk; a walk cut short returns `None`
    /// and caches nothing
    request_timeout: Duration,
    flights: SingleFlight<Option<ResolvedImage>>,
}

fn envelope_key(reference_key: &str) -> String {
    format!("image:{}", reference_key)
}

fn bytes_key(reference_key: &str) -> String {
    format!("image-bytes:{}", reference_key)
}

impl ImagePipeline {
    /// `tiers` is the priority order, normally fanart, imdb, url-cleanup
    pub fn new(cache: Arc<TieredCache>, tiers: Vec<Arc<dyn SourceAdapter>>, ttl: Duration) -> Self {
        let names: Vec<_> = tiers.iter().map(|t| t.name()).collect();
        tracing::debug!("Image pipeline tiers: {:?}", names);

        Self {
            cache,
            tiers,
            ttl,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            flights: SingleFlight::new(),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Resolve a reference to a working image. Bytes are only present when
    /// this call fetched them; use [`Self::resolve_with_bytes`] to also read
    /// cached bytes. `None` when no tier has the image.
    pub async fn resolve(&self, reference: &ImageReference) -> Option<ResolvedImage> {
        let reference_key = reference.cache_key()?;
        let key = envelope_key(&reference_key);

        if let Some(hit) = self.cache.get_json::<ResolvedImage>(&key).await {
            tracing::debug!("Image cache hit: {}", reference_key);
            return Some(hit);
        }

        self.flights
            .run(&key, || self.walk(reference, &reference_key))
            .await
    }

    pub async fn resolve_with_bytes(&self, reference: &ImageReference) -> Option<ResolvedImage> {
        let mut resolved = self.resolve(reference).await?;
        if resolved.bytes.is_none() {
            if let Some(reference_key) = reference.cache_key() {
                resolved.bytes = self.cache.get(&bytes_key(&reference_key)).await;
            }
        }
        Some(resolved)
    }

    async fn walk(&self, reference: &ImageReference, reference_key: &str) -> Option<ResolvedImage> {
        let deadline = Instant::now() + self.request_timeout;

        for tier in self
            .tiers
            .iter()
            .filter(|t| t.is_available() && t.supports(Capability::FetchImage))
        {
            let Ok(outcome) = timeout_at(deadline, tier.fetch_image(reference)).await else {
                tracing::warn!(
                    "Request deadline reached at {} resolving {}",
                    tier.name(),
                    reference_key
                );
                return None;
            };

            let payload = match outcome {
                Ok(Some(payload)) if !payload.url.trim().is_empty() => payload,
                Ok(_) => {
                    tracing::debug!("{}: no image for {}", tier.name(), reference_key);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("{}: image lookup failed for {}: {}", tier.name(), reference_key, e);
                    continue;
                }
            };

            let resolved = ResolvedImage {
                original_url: reference.original_url.clone(),
                resolved_url: payload.url,
                content_type: payload.content_type,
                source: tier.name().to_string(),
                bytes: payload.bytes,
            };
            self.store(reference_key, &resolved).await;

            tracing::debug!("Image resolved by {}: {}", tier.name(), resolved.resolved_url);
            return Some(resolved);
        }

        tracing::debug!("No artwork tier could resolve {}", reference_key);
        None
    }

    async fn store(&self, reference_key: &str, resolved: &ResolvedImage) {
        if let Some(ref bytes) = resolved.bytes {
            if let Err(e) = self
                .cache
                .set(&bytes_key(reference_key), bytes.clone(), self.ttl)
                .await
            {
                tracing::warn!("Failed to cache image bytes for {}: {}", reference_key, e);
            }
        }
        if let Err(e) = self
            .cache
            .set_json(&envelope_key(reference_key), resolved, self.ttl)
            .await
        {
            tracing::warn!("Failed to cache image for {}: {}", reference_key, e);
        }
    }
}
