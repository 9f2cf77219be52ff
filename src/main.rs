use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinefetch::cache::{sweeper, TieredCache};
use cinefetch::config::AppConfig;
use cinefetch::db::{self, SqliteTier};
use cinefetch::services::http::HttpClient;
use cinefetch::services::images::ImagePipeline;
use cinefetch::services::metadata::MetadataService;
use cinefetch::services::AdapterSet;
use cinefetch::{api, AppState};

/// Tracks all background task handles for graceful shutdown
struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    fn new() -> Self {
        Self {
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.handles.push((name, handle));
    }

    async fn shutdown(self) {
        tracing::info!("Initiating graceful shutdown...");

        self.shutdown.cancel();

        for (name, handle) in self.handles {
            tracing::debug!("Waiting for {} to finish...", name);
            match tokio::time::timeout(Duration::from_secs(10), handle).await {
                Ok(Ok(())) => tracing::debug!("{} finished cleanly", name),
                Ok(Err(e)) => tracing::warn!("{} panicked: {}", name, e),
                Err(_) => tracing::warn!("{} timed out during shutdown", name),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

/// Open the durable tier. A cache that cannot persist still serves from
/// memory, so failures here are logged rather than fatal.
async fn open_durable_tier(config: &AppConfig) -> Option<sqlx::SqlitePool> {
    if !config.durable_cache {
        tracing::info!("Durable cache tier disabled");
        return None;
    }

    let database_url = config.database_url();
    tracing::debug!("Database URL: {}", database_url);

    let pool = match db::connect(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!("Durable cache unavailable, running memory-only: {:#}", e);
            return None;
        }
    };

    if let Err(e) = db::migrate(&pool).await {
        tracing::warn!("Cache schema migration failed, running memory-only: {:#}", e);
        pool.close().await;
        return None;
    }

    Some(pool)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinefetch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();

    config.paths.ensure_dirs().await?;

    config.log_config();

    let pool = open_durable_tier(&config).await;
    let cache = Arc::new(match &pool {
        Some(pool) => TieredCache::with_durable(
            config.max_memory_entries,
            Arc::new(SqliteTier::new(pool.clone())),
        ),
        None => TieredCache::new(config.max_memory_entries),
    });

    let http = HttpClient::new(config.http.timeout(), config.http.retry_policy())
        .context("Failed to build HTTP client")?
        .with_max_image_bytes(config.http.max_image_bytes);
    let adapters = AdapterSet::from_config(&config.providers, http);

    let images = Arc::new(ImagePipeline::new(
        cache.clone(),
        adapters.ordered(&config.providers.image_priority),
        config.ttl.image,
    )
    .with_request_timeout(config.http.request_timeout()));
    let metadata = MetadataService::new(
        cache.clone(),
        adapters.ordered(&config.providers.metadata_priority),
        config.ttl.clone(),
        config.aggregator_options(),
    )
    .with_image_pipeline(images.clone());

    if !metadata.has_available_provider() {
        tracing::warn!("No metadata provider is available; searches will return empty results");
    }

    let state = Arc::new(AppState {
        metadata: Arc::new(metadata),
        images,
    });

    let mut bg_tasks = BackgroundTasks::new();

    match config.sweep_interval {
        Some(interval) => {
            let cancel = bg_tasks.token();
            bg_tasks.spawn(
                "cache sweeper",
                sweeper::run_sweeper(cache.clone(), interval, cancel),
            );
        }
        None => tracing::info!("Cache sweeper disabled (interval set to 0)"),
    }

    let app = api::app(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    tracing::info!("Starting server on {}", addr);

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
            _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        }
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    bg_tasks.shutdown().await;

    if let Some(pool) = pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
