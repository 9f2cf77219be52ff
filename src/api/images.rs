// Images API - the one entry point for artwork. Serves cached bytes when we
// have them, otherwise redirects to the resolved URL.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::models::ImageReference;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/proxy", get(proxy_image))
}

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub url: Option<String>,
    /// Canonical movie id, lets the artwork tiers look the movie up
    pub id: Option<String>,
}

/// GET /images/proxy?url=&id=
async fn proxy_image(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProxyParams>,
) -> Result<Response, (StatusCode, String)> {
    let reference = ImageReference {
        original_url: params.url.unwrap_or_default(),
        movie_id: params.id.filter(|id| !id.trim().is_empty()),
    };
    if reference.cache_key().is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Either url or id is required".to_string(),
        ));
    }

    let Some(resolved) = state.images.resolve_with_bytes(&reference).await else {
        return Err((StatusCode::NOT_FOUND, "No artwork found".to_string()));
    };

    match resolved.bytes {
        Some(bytes) => {
            let content_type = resolved
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, bytes.len())
                .header(header::CACHE_CONTROL, "public, max-age=86400")
                .body(Body::from(bytes))
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
        None => Ok(Redirect::temporary(&resolved.resolved_url).into_response()),
    }
}
