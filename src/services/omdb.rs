// OMDb metadata provider (secondary metadata API)
// API Documentation: https://www.omdbapi.com/

use async_trait::async_trait;
use serde::Deserialize;

use super::http::HttpClient;
use super::source::{split_id, Capability, RawRecord, SourceAdapter};
use crate::error::SourceError;
use crate::models::SearchQuery;

pub const OMDB_API_BASE: &str = "https://www.omdbapi.com";

const CAPABILITIES: &[Capability] = &[Capability::Search, Capability::FetchById];

pub struct OmdbAdapter {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

/// OMDb answers everything as strings, with "N/A" for missing values.
/// Search hits carry only title, year, id and poster.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OmdbMovie {
    pub title: Option<String>,
    pub year: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub runtime: Option<String>,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbSearchResponse {
    #[serde(default)]
    search: Vec<OmdbMovie>,
    response: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbDetailResponse {
    #[serde(flatten)]
    movie: OmdbMovie,
    response: Option<String>,
    error: Option<String>,
}

fn is_true(flag: &Option<String>) -> bool {
    flag.as_deref()
        .map(|f| f.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// "Movie not found!" style answers are empty results; anything else the
/// API reports as an error is a rejection
fn check_response(response: &Option<String>, error: &Option<String>) -> Result<bool, SourceError> {
    if is_true(response) {
        return Ok(true);
    }
    match error.as_deref() {
        Some(msg) if msg.to_lowercase().contains("not found") => Ok(false),
        Some(msg) if msg.to_lowercase().contains("limit reached") => Err(SourceError::RateLimited),
        Some(msg) if msg.to_lowercase().contains("api key") => {
            Err(SourceError::Unavailable(format!("OMDb: {}", msg)))
        }
        Some(msg) => Err(SourceError::Malformed(format!("OMDb: {}", msg))),
        None => Ok(false),
    }
}

impl OmdbAdapter {
    pub fn new(http: HttpClient, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .unwrap_or_else(|| OMDB_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn url(&self, params: &[(&str, &str)]) -> Result<String, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::Unavailable("OMDB_API_KEY not set".to_string()))?;

        let mut url = format!("{}/?apikey={}", self.base_url, urlencoding::encode(key));
        for (name, value) in params {
            url.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for OmdbAdapter {
    fn name(&self) -> &'static str {
        "omdb"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawRecord>, SourceError> {
        tracing::debug!("OMDb search: {}", query.text());
        let url = self.url(&[("s", query.text()), ("type", "movie")])?;
        let response: OmdbSearchResponse = self.http.get_json("omdb", &url).await?;

        if !check_response(&response.response, &response.error)? {
            return Ok(vec![]);
        }

        Ok(response
            .search
            .into_iter()
            .take(query.limit())
            .map(RawRecord::Omdb)
            .collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<RawRecord>, SourceError> {
        let imdb_id = match split_id(id) {
            Some(("imdb", local)) if local.starts_with("tt") => local,
            _ => return Ok(None),
        };

        let url = self.url(&[("i", imdb_id), ("plot", "short")])?;
        let response: Option<OmdbDetailResponse> = self.http.get_optional_json("omdb", &url).await?;

        match response {
            Some(detail) if check_response(&detail.response, &detail.error)? => {
                Ok(Some(RawRecord::Omdb(detail.movie)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;

    fn adapter(key: Option<&str>) -> OmdbAdapter {
        OmdbAdapter::new(
            HttpClient::new(Duration::from_secs(1), RetryPolicy::none()).unwrap(),
            key.map(str::to_string),
            Some("http://omdb.test".to_string()),
        )
    }

    #[test]
    fn test_parse_detail() {
        let json = r#"{
            "Title": "Interstellar",
            "Year": "2014",
            "Runtime": "169 min",
            "Plot": "N/A",
            "Poster": "https://m.media-amazon.com/images/M/abc._V1_SX300.jpg",
            "imdbRating": "8.7",
            "imdbID": "tt0816692",
            "Type": "movie",
            "Response": "True"
        }"#;
        let detail: OmdbDetailResponse = serde_json::from_str(json).unwrap();
        assert!(check_response(&detail.response, &detail.error).unwrap());
        assert_eq!(detail.movie.imdb_id.as_deref(), Some("tt0816692"));
        assert_eq!(detail.movie.runtime.as_deref(), Some("169 min"));
        assert_eq!(detail.movie.kind.as_deref(), Some("movie"));
    }

    #[test]
    fn test_not_found_is_empty_and_bad_key_is_unavailable() {
        let json = r#"{"Response": "False", "Error": "Movie not found!"}"#;
        let response: OmdbSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(check_response(&response.response, &response.error), Ok(false));
        assert!(response.search.is_empty());

        let bad_key = Some("Invalid API key!".to_string());
        assert!(matches!(
            check_response(&Some("False".to_string()), &bad_key),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_daily_limit_is_rate_limited() {
        let json = r#"{"Response": "False", "Error": "Request limit reached!"}"#;
        let response: OmdbSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            check_response(&response.response, &response.error),
            Err(SourceError::RateLimited)
        );
    }

    #[test]
    fn test_url() {
        let omdb = adapter(Some("abc"));
        assert_eq!(
            omdb.url(&[("s", "star wars"), ("type", "movie")]).unwrap(),
            "http://omdb.test/?apikey=abc&s=star%20wars&type=movie"
        );
    }

    #[tokio::test]
    async fn test_only_imdb_ids_are_looked_up() {
        let omdb = adapter(None);
        assert!(!omdb.is_available());
        assert_eq!(omdb.fetch_by_id("tmdb:155").await, Ok(None));
        assert!(matches!(
            omdb.fetch_by_id("imdb:tt0816692").await,
            Err(SourceError::Unavailable(_))
        ));
    }
}
