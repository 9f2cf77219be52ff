use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache counters. Observational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory_entries: u64,
    pub durable_entries: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Monotonic hit/miss counters shared across in-flight requests
#[derive(Debug, Default)]
pub struct HitCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = HitCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert_eq!((counters.hits(), counters.misses()), (2, 1));
    }

    #[test]
    fn test_stats_json_field_names() {
        let json = serde_json::to_value(CacheStats::default()).unwrap();
        for field in ["memoryEntries", "durableEntries", "hits", "misses"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
