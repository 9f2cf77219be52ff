// fanart.tv artwork provider
// API Documentation: https://fanarttv.docs.apiary.io/

use async_trait::async_trait;
use serde::Deserialize;

use super::http::HttpClient;
use super::source::{split_id, Capability, SourceAdapter};
use crate::error::SourceError;
use crate::models::{ImagePayload, ImageReference};

pub const FANART_API_BASE: &str = "https://webservice.fanart.tv/v3";

const CAPABILITIES: &[Capability] = &[Capability::FetchImage];
const PREFERRED_LANG: &str = "en";

pub struct FanartAdapter {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FanartMovie {
    #[serde(default)]
    movieposter: Vec<FanartImage>,
}

#[derive(Debug, Clone, Deserialize)]
struct FanartImage {
    url: String,
    lang: Option<String>,
    /// fanart.tv sends counts as strings
    likes: Option<String>,
}

impl FanartImage {
    fn likes(&self) -> u64 {
        self.likes
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(0)
    }

    fn is_preferred_lang(&self) -> bool {
        self.lang.as_deref() == Some(PREFERRED_LANG)
    }
}

/// English posters first, then the most liked
fn best_poster(posters: Vec<FanartImage>) -> Option<String> {
    posters
        .into_iter()
        .filter(|p| !p.url.trim().is_empty())
        .max_by_key(|p| (p.is_preferred_lang(), p.likes()))
        .map(|p| p.url)
}

impl FanartAdapter {
    pub fn new(http: HttpClient, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .unwrap_or_else(|| FANART_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FanartAdapter {
    fn name(&self) -> &'static str {
        "fanart"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_image(
        &self,
        reference: &ImageReference,
    ) -> Result<Option<ImagePayload>, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::Unavailable("FANART_API_KEY not set".to_string()))?;

        // fanart.tv takes either a TMDB id or an IMDb id
        let lookup_id = match reference.movie_id.as_deref().and_then(split_id) {
            Some(("tmdb", id)) | Some(("imdb", id)) => id,
            _ => return Ok(None),
        };

        let url = format!(
            "{}/movies/{}?api_key={}",
            self.base_url,
            urlencoding::encode(lookup_id),
            urlencoding::encode(key)
        );
        let movie: Option<FanartMovie> = self.http.get_optional_json("fanart", &url).await?;

        Ok(movie
            .and_then(|m| best_poster(m.movieposter))
            .map(ImagePayload::url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn test_best_poster_prefers_english_then_likes() {
        let json = r#"{
            "name": "The Dark Knight",
            "tmdb_id": "155",
            "imdb_id": "tt0468569",
            "movieposter": [
                {"id": "1", "url": "https://assets.fanart.tv/fr.jpg", "lang": "fr", "likes": "40"},
                {"id": "2", "url": "https://assets.fanart.tv/en-low.jpg", "lang": "en", "likes": "2"},
                {"id": "3", "url": "https://assets.fanart.tv/en-high.jpg", "lang": "en", "likes": "9"}
            ]
        }"#;
        let movie: FanartMovie = serde_json::from_str(json).unwrap();
        assert_eq!(
            best_poster(movie.movieposter).as_deref(),
            Some("https://assets.fanart.tv/en-high.jpg")
        );
    }

    #[test]
    fn test_no_posters() {
        let movie: FanartMovie = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(best_poster(movie.movieposter), None);
    }

    #[tokio::test]
    async fn test_without_key_or_id() {
        let http = HttpClient::new(Duration::from_secs(1), RetryPolicy::none()).unwrap();
        let keyless = FanartAdapter::new(http.clone(), None, None);
        assert!(!keyless.is_available());

        let reference = ImageReference {
            original_url: String::new(),
            movie_id: Some("tmdb:155".to_string()),
        };
        assert!(matches!(
            keyless.fetch_image(&reference).await,
            Err(SourceError::Unavailable(_))
        ));

        let keyed = FanartAdapter::new(http, Some("k".to_string()), None);
        assert_eq!(
            keyed.fetch_image(&ImageReference::new("http://x/y.jpg")).await,
            Ok(None)
        );
    }
}
