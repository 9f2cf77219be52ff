// TMDB metadata provider
// API Documentation: https://developer.themoviedb.org/reference/intro/getting-started

use async_trait::async_trait;
use serde::Deserialize;

use super::http::HttpClient;
use super::source::{split_id, Capability, RawRecord, SourceAdapter};
use crate::error::SourceError;
use crate::models::{Listing, SearchQuery};

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// TMDB pages are fixed at 20 results
const PAGE_SIZE: usize = 20;
const MAX_PAGES: usize = 3;

const CAPABILITIES: &[Capability] = &[Capability::Search, Capability::FetchById, Capability::List];

/// TMDB movie genres as used by `/discover/movie?with_genres=`
const GENRES: &[(&str, u32)] = &[
    ("action", 28),
    ("adventure", 12),
    ("animation", 16),
    ("comedy", 35),
    ("crime", 80),
    ("documentary", 99),
    ("drama", 18),
    ("family", 10751),
    ("fantasy", 14),
    ("history", 36),
    ("horror", 27),
    ("music", 10402),
    ("mystery", 9648),
    ("romance", 10749),
    ("science fiction", 878),
    ("sci-fi", 878),
    ("scifi", 878),
    ("tv movie", 10770),
    ("thriller", 53),
    ("war", 10752),
    ("western", 37),
];

pub struct TmdbAdapter {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

/// Movie as returned by search, list and detail endpoints. Detail responses
/// add `runtime` and `imdb_id`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub runtime: Option<i32>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbPage {
    #[serde(default)]
    results: Vec<TmdbMovie>,
    #[serde(default)]
    total_pages: Option<usize>,
}

/// TMDB genre id for a genre name, case-insensitive
pub fn genre_id(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase().replace(['_', '+'], " ");
    if let Ok(id) = name.parse::<u32>() {
        return GENRES.iter().find(|(_, g)| *g == id).map(|(_, g)| *g);
    }
    GENRES.iter().find(|(n, _)| *n == name).map(|(_, id)| *id)
}

impl TmdbAdapter {
    pub fn new(http: HttpClient, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .unwrap_or_else(|| TMDB_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::Unavailable("TMDB_API_KEY not set".to_string()))
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let mut url = format!(
            "{}{}?api_key={}",
            self.base_url,
            path,
            urlencoding::encode(self.api_key()?)
        );
        for (name, value) in params {
            url.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
        }
        Ok(url)
    }

    /// Fetch pages until `limit` results or the last page
    async fn paged(
        &self,
        path: &str,
        params: &[(&str, String)],
        limit: usize,
    ) -> Result<Vec<TmdbMovie>, SourceError> {
        let pages = limit.div_ceil(PAGE_SIZE).clamp(1, MAX_PAGES);
        let mut movies = Vec::new();

        for page in 1..=pages {
            let mut params = params.to_vec();
            params.push(("page", page.to_string()));
            let url = self.url(path, &params)?;

            let response: TmdbPage = self.http.get_json("tmdb", &url).await?;
            let last_page = response.total_pages.unwrap_or(1);
            let empty = response.results.is_empty();
            movies.extend(response.results);

            if empty || movies.len() >= limit || page >= last_page {
                break;
            }
        }

        movies.truncate(limit);
        Ok(movies)
    }
}

#[async_trait]
impl SourceAdapter for TmdbAdapter {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawRecord>, SourceError> {
        tracing::debug!("TMDB search: {}", query.text());
        let params = [
            ("query", query.text().to_string()),
            ("include_adult", "false".to_string()),
        ];
        let movies = self.paged("/search/movie", &params, query.limit()).await?;
        Ok(movies.into_iter().map(RawRecord::Tmdb).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<RawRecord>, SourceError> {
        let tmdb_id = match split_id(id) {
            Some(("tmdb", local)) => match local.parse::<i64>() {
                Ok(n) => n,
                Err(_) => return Ok(None),
            },
            _ => return Ok(None),
        };

        let url = self.url(&format!("/movie/{}", tmdb_id), &[])?;
        let movie: Option<TmdbMovie> = self.http.get_optional_json("tmdb", &url).await?;
        Ok(movie.map(RawRecord::Tmdb))
    }

    async fn list(&self, listing: &Listing, limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        let movies = match listing {
            Listing::Popular => self.paged("/movie/popular", &[], limit).await?,
            Listing::Trending => self.paged("/trending/movie/week", &[], limit).await?,
            Listing::Genre(name) => {
                let Some(id) = genre_id(name) else {
                    tracing::debug!("TMDB: unknown genre {:?}", name);
                    return Ok(vec![]);
                };
                let params = [
                    ("with_genres", id.to_string()),
                    ("sort_by", "popularity.desc".to_string()),
                    ("include_adult", "false".to_string()),
                ];
                self.paged("/discover/movie", &params, limit).await?
            }
        };
        Ok(movies.into_iter().map(RawRecord::Tmdb).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;

    fn adapter(key: Option<&str>) -> TmdbAdapter {
        TmdbAdapter::new(
            HttpClient::new(Duration::from_secs(1), RetryPolicy::none()).unwrap(),
            key.map(str::to_string),
            Some("http://tmdb.test/3/".to_string()),
        )
    }

    #[test]
    fn test_genre_lookup() {
        assert_eq!(genre_id("Action"), Some(28));
        assert_eq!(genre_id(" science fiction "), Some(878));
        assert_eq!(genre_id("Sci-Fi"), Some(878));
        assert_eq!(genre_id("878"), Some(878));
        assert_eq!(genre_id("telenovela"), None);
        assert_eq!(genre_id("4242"), None);
    }

    #[test]
    fn test_url_encodes_params() {
        let tmdb = adapter(Some("k3y"));
        let url = tmdb
            .url("/search/movie", &[("query", "the dark knight".to_string())])
            .unwrap();
        assert_eq!(
            url,
            "http://tmdb.test/3/search/movie?api_key=k3y&query=the%20dark%20knight"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let tmdb = adapter(Some("  "));
        assert!(!tmdb.is_available());

        let query = SearchQuery::with_default_limit("heat").unwrap();
        assert!(matches!(
            tmdb.search(&query).await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_ids_are_not_found() {
        let tmdb = adapter(Some("k3y"));
        assert_eq!(tmdb.fetch_by_id("imdb:tt0468569").await, Ok(None));
        assert_eq!(tmdb.fetch_by_id("tmdb:abc").await, Ok(None));
    }

    #[test]
    fn test_parse_search_page() {
        let json = r#"{
            "page": 1,
            "results": [{
                "id": 155,
                "title": "The Dark Knight",
                "original_title": "The Dark Knight",
                "overview": "Batman raises the stakes.",
                "release_date": "2008-07-16",
                "poster_path": "/qJ2tW6WMUDux911r6m7haRef0WH.jpg",
                "vote_average": 8.5,
                "vote_count": 32000,
                "genre_ids": [18, 28]
            }],
            "total_pages": 1,
            "total_results": 1
        }"#;
        let page: TmdbPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].id, 155);
        assert_eq!(page.results[0].runtime, None);
    }
}
