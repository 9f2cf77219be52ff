use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

mod cache;
mod images;
mod movies;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/movies", movies::routes())
        .nest("/images", images::routes()) // Single artwork entry point
        .merge(cache::routes())
}

/// Full application router with middleware and state
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
