// Movies API - search, suggestions, curated listings and details

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::QueryError;
use crate::models::{check_limit, CanonicalMovie, SearchQuery, DEFAULT_SEARCH_LIMIT};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search))
        .route("/suggestions", get(suggestions))
        .route("/popular", get(popular))
        .route("/trending", get(trending))
        .route("/genre/:genre", get(by_genre))
        .route("/:id", get(movie_detail))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
    /// Resolve posters through the artwork tiers
    #[serde(default)]
    pub artwork: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub artwork: bool,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn bad_request(e: QueryError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

impl SearchParams {
    fn to_query(&self) -> ApiResult<SearchQuery> {
        SearchQuery::new(
            self.query.as_deref().unwrap_or_default(),
            self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        )
        .map_err(bad_request)
    }
}

impl ListParams {
    fn limit(&self) -> ApiResult<usize> {
        check_limit(self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)).map_err(bad_request)
    }
}

async fn with_artwork(state: &AppState, movies: Vec<CanonicalMovie>, artwork: bool) -> Vec<CanonicalMovie> {
    if artwork {
        state.metadata.attach_artwork(movies).await
    } else {
        movies
    }
}

/// GET /movies/search?query=&limit=
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<CanonicalMovie>>> {
    let query = params.to_query()?;
    let movies = state.metadata.search(&query).await;
    Ok(Json(with_artwork(&state, movies, params.artwork).await))
}

/// GET /movies/suggestions?query=&limit=
async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<CanonicalMovie>>> {
    let query = params.to_query()?;
    let movies = state.metadata.suggestions(&query).await;
    Ok(Json(with_artwork(&state, movies, params.artwork).await))
}

async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<CanonicalMovie>>> {
    let movies = state.metadata.popular(params.limit()?).await;
    Ok(Json(with_artwork(&state, movies, params.artwork).await))
}

async fn trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<CanonicalMovie>>> {
    let movies = state.metadata.trending(params.limit()?).await;
    Ok(Json(with_artwork(&state, movies, params.artwork).await))
}

async fn by_genre(
    State(state): State<Arc<AppState>>,
    Path(genre): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<CanonicalMovie>>> {
    let movies = state
        .metadata
        .by_genre(&genre, params.limit()?)
        .await
        .map_err(bad_request)?;
    Ok(Json(with_artwork(&state, movies, params.artwork).await))
}

/// GET /movies/:id - canonical id such as `tmdb:155`
async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CanonicalMovie>> {
    match state.metadata.movie_detail(&id).await.map_err(bad_request)? {
        Some(movie) => Ok(Json(movie)),
        None => Err((StatusCode::NOT_FOUND, format!("Movie not found: {}", id))),
    }
}
