use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::entry::CacheEntry;
use super::memory::MemoryTier;
use super::stats::{CacheStats, HitCounters};
use super::DurableTier;
use crate::error::CacheError;

/// Read-through / write-through cache over a fast memory tier and an
/// optional durable tier.
///
/// Reads check memory first, then the durable tier; a live durable hit is
/// promoted into memory with its original expiry. Writes go to both tiers.
/// A failing durable tier is logged and skipped, so the worst case is a
/// memory-only cache (and with an empty memory tier, "always miss").
pub struct TieredCache {
    memory: MemoryTier,
    durable: Option<Arc<dyn DurableTier>>,
    counters: HitCounters,
}

impl TieredCache {
    /// Memory-only cache
    pub fn new(max_memory_entries: usize) -> Self {
        Self {
            memory: MemoryTier::new(max_memory_entries),
            durable: None,
            counters: HitCounters::default(),
        }
    }

    pub fn with_durable(max_memory_entries: usize, durable: Arc<dyn DurableTier>) -> Self {
        Self {
            memory: MemoryTier::new(max_memory_entries),
            durable: Some(durable),
            counters: HitCounters::default(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Utc::now();

        if let Some(value) = self.memory.get(key, now) {
            self.counters.record_hit();
            return Some(value);
        }

        if let Some(ref durable) = self.durable {
            match durable.load(key).await {
                Ok(Some(entry)) if !entry.is_expired_at(now) => {
                    tracing::debug!("Cache: promoting {} from durable tier", key);
                    let value = entry.value.clone();
                    self.memory.insert(key, entry);
                    self.counters.record_hit();
                    return Some(value);
                }
                Ok(Some(_)) => {
                    if let Err(e) = durable.remove(key).await {
                        tracing::warn!("Cache: failed to evict expired {}: {}", key, e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Cache: durable read failed for {}: {}", key, e);
                }
            }
        }

        self.counters.record_miss();
        None
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, ttl)?;

        if let Some(ref durable) = self.durable {
            if let Err(e) = durable.store(key, &entry).await {
                tracing::warn!("Cache: durable write failed for {}, memory only: {}", key, e);
            }
        }

        self.memory.insert(key, entry);
        Ok(())
    }

    pub async fn delete(&self, key: &str) {
        self.memory.remove(key);
        if let Some(ref durable) = self.durable {
            if let Err(e) = durable.remove(key).await {
                tracing::warn!("Cache: durable delete failed for {}: {}", key, e);
            }
        }
    }

    pub async fn clear(&self) {
        self.memory.clear();
        if let Some(ref durable) = self.durable {
            if let Err(e) = durable.clear().await {
                tracing::warn!("Cache: durable clear failed: {}", e);
            }
        }
        tracing::info!("Cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let durable_entries = match self.durable {
            Some(ref durable) => durable.count(now).await.unwrap_or_else(|e| {
                tracing::warn!("Cache: durable count failed: {}", e);
                0
            }),
            None => 0,
        };

        CacheStats {
            memory_entries: self.memory.live_len(now) as u64,
            durable_entries,
            hits: self.counters.hits(),
            misses: self.counters.misses(),
        }
    }

    /// Remove expired entries from both tiers, returns how many went
    pub async fn purge_expired(&self) -> u64 {
        let now = Utc::now();
        let mut removed = self.memory.purge_expired(now) as u64;

        if let Some(ref durable) = self.durable {
            match durable.purge_expired(now).await {
                Ok(count) => removed += count,
                Err(e) => tracing::warn!("Cache: durable purge failed: {}", e),
            }
        }
        removed
    }

    /// Typed read. A value that no longer deserializes is dropped and
    /// reported as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Cache: dropping undecodable value for {}: {}", key, e);
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, ttl).await
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("memory", &self.memory)
            .field("durable", &self.durable.is_some())
            .finish()
    }
}
