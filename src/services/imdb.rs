// IMDb suggestion endpoint, the keyless scraped fallback. It only knows
// titles, years and a poster, which is enough for search results and
// artwork lookups.

use async_trait::async_trait;
use serde::Deserialize;

use super::http::HttpClient;
use super::source::{split_id, Capability, RawRecord, SourceAdapter};
use crate::error::SourceError;
use crate::models::{ImagePayload, ImageReference, SearchQuery};

pub const IMDB_SUGGEST_BASE: &str = "https://v3.sg.media-imdb.com/suggestion";

const CAPABILITIES: &[Capability] = &[
    Capability::Search,
    Capability::FetchById,
    Capability::FetchImage,
];

/// Suggestion kinds that are movies
const MOVIE_KINDS: &[&str] = &["movie", "tvMovie"];

pub struct ImdbAdapter {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImdbSuggestion {
    pub id: String,
    #[serde(rename = "l")]
    pub title: Option<String>,
    #[serde(rename = "y")]
    pub year: Option<i32>,
    #[serde(rename = "qid")]
    pub kind: Option<String>,
    #[serde(rename = "i")]
    pub image: Option<ImdbImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImdbImage {
    #[serde(rename = "imageUrl")]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionResponse {
    #[serde(default)]
    d: Vec<ImdbSuggestion>,
}

impl ImdbSuggestion {
    fn is_movie(&self) -> bool {
        if !self.id.starts_with("tt") {
            return false;
        }
        match self.kind.as_deref() {
            Some(kind) => MOVIE_KINDS.contains(&kind),
            None => true,
        }
    }
}

impl ImdbAdapter {
    pub fn new(http: HttpClient, base_url: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| IMDB_SUGGEST_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Suggestion files are sharded by the first character of the query
    fn url(&self, term: &str) -> String {
        let term = term.trim().to_lowercase();
        let shard = term
            .chars()
            .find(|c| c.is_ascii_alphanumeric())
            .unwrap_or('x');
        format!(
            "{}/{}/{}.json",
            self.base_url,
            shard,
            urlencoding::encode(&term)
        )
    }

    async fn suggestions(&self, term: &str) -> Result<Vec<ImdbSuggestion>, SourceError> {
        let response: Option<SuggestionResponse> =
            self.http.get_optional_json("imdb", &self.url(term)).await?;
        Ok(response
            .map(|r| r.d.into_iter().filter(ImdbSuggestion::is_movie).collect())
            .unwrap_or_default())
    }

    async fn lookup(&self, imdb_id: &str) -> Result<Option<ImdbSuggestion>, SourceError> {
        let hits = self.suggestions(imdb_id).await?;
        Ok(hits.into_iter().find(|s| s.id == imdb_id))
    }
}

fn imdb_id_of(id: &str) -> Option<&str> {
    match split_id(id) {
        Some(("imdb", local)) if local.starts_with("tt") => Some(local),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for ImdbAdapter {
    fn name(&self) -> &'static str {
        "imdb"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawRecord>, SourceError> {
        tracing::debug!("IMDb suggestion search: {}", query.text());
        let mut hits = self.suggestions(query.text()).await?;
        hits.truncate(query.limit());
        Ok(hits.into_iter().map(RawRecord::Imdb).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<RawRecord>, SourceError> {
        let Some(imdb_id) = imdb_id_of(id) else {
            return Ok(None);
        };
        Ok(self.lookup(imdb_id).await?.map(RawRecord::Imdb))
    }

    async fn fetch_image(
        &self,
        reference: &ImageReference,
    ) -> Result<Option<ImagePayload>, SourceError> {
        let Some(imdb_id) = reference.movie_id.as_deref().and_then(imdb_id_of) else {
            return Ok(None);
        };
        let poster = self
            .lookup(imdb_id)
            .await?
            .and_then(|s| s.image)
            .map(|image| image.url)
            .filter(|url| !url.trim().is_empty());
        Ok(poster.map(ImagePayload::url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;

    fn adapter() -> ImdbAdapter {
        ImdbAdapter::new(
            HttpClient::new(Duration::from_secs(1), RetryPolicy::none()).unwrap(),
            Some("http://imdb.test/suggestion/".to_string()),
        )
    }

    #[test]
    fn test_url_is_sharded_by_first_char() {
        let imdb = adapter();
        assert_eq!(
            imdb.url("The Matrix"),
            "http://imdb.test/suggestion/t/the%20matrix.json"
        );
        assert_eq!(imdb.url("  !!!"), "http://imdb.test/suggestion/x/%21%21%21.json");
    }

    #[test]
    fn test_parse_and_filter_movies() {
        let json = r#"{
            "d": [
                {"i": {"height": 1000, "imageUrl": "https://m.media-amazon.com/images/M/a.jpg", "width": 675},
                 "id": "tt0133093", "l": "The Matrix", "q": "feature", "qid": "movie",
                 "rank": 30, "s": "Keanu Reeves, Laurence Fishburne", "y": 1999},
                {"id": "nm0000206", "l": "Keanu Reeves", "s": "Actor"},
                {"id": "tt0106062", "l": "Matrix", "qid": "tvSeries", "y": 1993}
            ],
            "q": "the matrix",
            "v": 1
        }"#;
        let response: SuggestionResponse = serde_json::from_str(json).unwrap();
        let movies: Vec<_> = response.d.into_iter().filter(ImdbSuggestion::is_movie).collect();

        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, "tt0133093");
        assert_eq!(movies[0].year, Some(1999));
        assert!(movies[0].image.is_some());
    }

    #[tokio::test]
    async fn test_image_needs_an_imdb_id() {
        let imdb = adapter();
        let reference = ImageReference {
            original_url: String::new(),
            movie_id: Some("tmdb:155".to_string()),
        };
        assert_eq!(imdb.fetch_image(&reference).await, Ok(None));
        assert_eq!(imdb.fetch_by_id("tmdb:155").await, Ok(None));
    }
}
