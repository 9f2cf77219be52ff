// Background expiry sweep. Lookups already ignore expired entries, so this
// only reclaims memory and durable rows.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::TieredCache;

pub async fn run_sweeper(cache: Arc<TieredCache>, interval: Duration, cancel: CancellationToken) {
    tracing::info!("Cache sweeper started (interval: {:?})", interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Cache sweeper received shutdown signal");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let removed = cache.purge_expired().await;
                if removed > 0 {
                    tracing::info!("Cache sweep: removed {} expired entries", removed);
                } else {
                    tracing::debug!("Cache sweep: nothing expired");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_removes_expired_and_stops() {
        let cache = Arc::new(TieredCache::new(100));
        cache
            .set("gone", b"1".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set("kept", b"2".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweeper(
            cache.clone(),
            Duration::from_millis(30),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        // The sweeper already reclaimed the expired entry
        assert_eq!(cache.purge_expired().await, 0);
        assert_eq!(cache.stats().await.memory_entries, 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
