// SQLite persistence for the durable cache tier

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheEntry, DurableTier};
use crate::error::CacheError;

/// Open the SQLite pool with the same tuning the server has always used
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {}", database_url))?
        .create_if_missing(true)
        // Enable WAL mode for better concurrent performance
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        // NORMAL sync is safe with WAL and much faster
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        // Busy timeout for concurrent access (5 seconds)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                use sqlx::Executor;
                // Cache size: -16000 = 16MB (negative = KB)
                conn.execute("PRAGMA cache_size = -16000").await?;
                conn.execute("PRAGMA temp_store = MEMORY").await?;
                Ok(())
            })
        })
        .connect_with(connect_options)
        .await
        .context("Failed to open cache database")?;

    tracing::info!("SQLite configured: WAL mode, 16MB cache (per connection)");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at
            ON cache_entries(expires_at);
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create cache_entries table")?;

    Ok(())
}

/// Durable cache tier: one `cache_entries` row per key, timestamps in Unix
/// milliseconds
#[derive(Debug, Clone)]
pub struct SqliteTier {
    pool: SqlitePool,
}

impl SqliteTier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, CacheError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| CacheError::Serialization(format!("invalid timestamp {}", ms)))
}

#[async_trait]
impl DurableTier for SqliteTier {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<(Vec<u8>, i64, i64)> = sqlx::query_as(
            "SELECT value, created_at, expires_at FROM cache_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(value, created_at, expires_at)| {
            Ok(CacheEntry {
                value,
                created_at: from_millis(created_at)?,
                expires_at: from_millis(expires_at)?,
            })
        })
        .transpose()
    }

    async fn store(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(entry.value.as_slice())
        .bind(entry.created_at.timestamp_millis())
        .bind(entry.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?")
                .bind(now.timestamp_millis())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Single-connection in-memory database; every `sqlite::memory:` connection
/// is its own database, so the pool must never open a second one
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}
