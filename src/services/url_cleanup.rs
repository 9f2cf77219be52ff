// Last artwork tier: take the URL the provider gave us, clean it up, and
// check that it really serves an image.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

use super::http::{is_public_url, HttpClient};
use super::source::{Capability, SourceAdapter};
use crate::error::SourceError;
use crate::models::{ImagePayload, ImageReference};

const CAPABILITIES: &[Capability] = &[Capability::FetchImage];

/// Amazon/IMDb resize directives: `..._V1_SX300.jpg` → `..._V1_.jpg`
static RE_AMAZON_RESIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\._V1_[^/]*?(\.[A-Za-z0-9]+)$").unwrap());
/// TMDB size segment: `/t/p/w92/` or `/t/p/original/`
static RE_TMDB_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/t/p/(?:w\d+|h\d+|original)/").unwrap());

pub const TMDB_POSTER_SIZE: &str = "w500";

pub struct UrlCleanupAdapter {
    http: HttpClient,
}

/// Normalize an artwork URL. `None` for blank, placeholder or non-http
/// input, and for URLs pointing at internal hosts.
pub fn clean_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() || url.eq_ignore_ascii_case("n/a") {
        return None;
    }

    let url = if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    };

    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }
    match Url::parse(&url) {
        Ok(parsed) if is_public_url(&parsed) => {}
        _ => return None,
    }

    let url = if lower.contains("media-amazon.com") || lower.contains("media-imdb.com") {
        RE_AMAZON_RESIZE.replace(&url, "._V1_$1").into_owned()
    } else {
        url
    };

    let url = if lower.contains("image.tmdb.org") {
        RE_TMDB_SIZE
            .replace(&url, format!("/t/p/{}/", TMDB_POSTER_SIZE).as_str())
            .into_owned()
    } else {
        url
    };

    Some(url)
}

impl UrlCleanupAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for UrlCleanupAdapter {
    fn name(&self) -> &'static str {
        "url-cleanup"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn fetch_image(
        &self,
        reference: &ImageReference,
    ) -> Result<Option<ImagePayload>, SourceError> {
        let Some(url) = clean_url(&reference.original_url) else {
            return Ok(None);
        };

        match self.http.get_image("url-cleanup", &url).await {
            Ok(payload) => Ok(Some(payload)),
            // The URL is simply dead or not an image
            Err(SourceError::Rejected(_)) | Err(SourceError::Malformed(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
