// Tiered key/value cache with expiration. Knows nothing about movies.

pub mod entry;
pub mod memory;
pub mod stats;
pub mod store;
pub mod sweeper;
pub mod ttl;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CacheError;

pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TieredCache;
pub use ttl::{CacheCategory, TtlPolicy};

/// Slower tier that survives restarts. Implemented over SQLite in
/// [`crate::db::SqliteTier`].
///
/// Every method may fail with [`CacheError::Unavailable`]; the tiered store
/// logs and degrades instead of failing the caller.
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn store(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    /// Number of entries still live at `now`
    async fn count(&self, now: DateTime<Utc>) -> Result<u64, CacheError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError>;
}
