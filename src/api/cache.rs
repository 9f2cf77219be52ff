// Cache API - statistics and manual invalidation

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cache", delete(clear_cache))
        .route("/cache/stats", get(cache_stats))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.metadata.cache_stats().await)
}

/// DELETE /cache - drop every entry from both tiers
async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.metadata.cache().clear().await;
    StatusCode::NO_CONTENT
}
