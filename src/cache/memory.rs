// Fast in-process tier. DashMap shards keys so unrelated keys never contend
// on one lock; each insert replaces the whole entry atomically.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::entry::CacheEntry;

pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 10_000;

#[derive(Debug)]
pub struct MemoryTier {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl MemoryTier {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Live value for `key`. An expired entry is evicted and reported absent.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<u8>> {
        // The read guard must be released before remove_if takes the shard lock
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries
                .remove_if(key, |_, entry| entry.is_expired_at(now));
        }
        None
    }

    pub fn insert(&self, key: &str, entry: CacheEntry) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.make_room(Utc::now());
        }
        self.entries.insert(key.to_string(), entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Entries that are still live at `now`
    pub fn live_len(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired_at(now))
            .count()
    }

    /// Drop expired entries first; if the tier is still full, drop the entry
    /// closest to expiry. The durable tier keeps whatever is dropped here.
    fn make_room(&self, now: DateTime<Utc>) {
        if self.purge_expired(now) > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            tracing::debug!("Memory tier full, evicting {}", key);
            self.entries.remove(&key);
        }
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_ENTRIES)
    }
}
