use serde::{Deserialize, Serialize};

use crate::error::QueryError;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Provider-agnostic movie record returned to callers.
///
/// Once handed out a record is never mutated; replacing the poster with a
/// resolved URL produces a new value (see [`CanonicalMovie::with_poster`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMovie {
    /// Provider-namespaced identifier, e.g. `tmdb:155` or `imdb:tt0468569`
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub plot: Option<String>,
    #[serde(rename = "poster")]
    pub poster_url: Option<String>,
    pub rating: Option<f64>,
    /// Name of the adapter that produced the winning record
    pub source: String,
    #[serde(rename = "runtime")]
    pub runtime_minutes: Option<u32>,
}

impl CanonicalMovie {
    pub fn with_poster(&self, poster_url: Option<String>) -> Self {
        Self {
            poster_url,
            ..self.clone()
        }
    }
}

/// Result counts accepted from callers: 1..=50
pub fn check_limit(limit: usize) -> Result<usize, QueryError> {
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(QueryError::InvalidLimit {
            got: limit,
            max: MAX_SEARCH_LIMIT,
        });
    }
    Ok(limit)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    limit: usize,
}

impl SearchQuery {
    /// Validate caller input. The text is trimmed; the limit must be 1..=50.
    pub fn new(text: &str, limit: usize) -> Result<Self, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        Ok(Self {
            text: text.to_string(),
            limit: check_limit(limit)?,
        })
    }

    pub fn with_default_limit(text: &str) -> Result<Self, QueryError> {
        Self::new(text, DEFAULT_SEARCH_LIMIT)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Lowercased, whitespace-collapsed text used for cache keys
    pub fn normalized_text(&self) -> String {
        self.text
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Curated listings served by the `list` capability
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listing {
    Popular,
    Trending,
    Genre(String),
}

impl Listing {
    pub fn cache_key(&self, limit: usize) -> String {
        match self {
            Listing::Popular => format!("popular:{}", limit),
            Listing::Trending => format!("trending:{}", limit),
            Listing::Genre(genre) => format!("genre:{}:{}", genre.trim().to_lowercase(), limit),
        }
    }
}

/// Artwork reference as supplied by a provider record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub original_url: String,
    /// Canonical id of the movie the artwork belongs to, used by the
    /// artwork tiers that look images up by id
    pub movie_id: Option<String>,
}

impl ImageReference {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            movie_id: None,
        }
    }

    pub fn for_movie(movie: &CanonicalMovie) -> Self {
        Self {
            original_url: movie.poster_url.clone().unwrap_or_default(),
            movie_id: Some(movie.id.clone()),
        }
    }

    /// Stable key for the image cache. The movie id is part of the key
    /// whenever it is known, since the id-based tiers can only answer for
    /// references that carry one.
    pub fn cache_key(&self) -> Option<String> {
        let url = self.original_url.trim();
        let id = self
            .movie_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        match (id, url.is_empty()) {
            (Some(id), false) => Some(format!("id:{}|{}", id, url)),
            (Some(id), true) => Some(format!("id:{}", id)),
            (None, false) => Some(url.to_string()),
            (None, true) => None,
        }
    }
}

/// What an artwork tier hands back for a reference
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub url: String,
    pub bytes: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

impl ImagePayload {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bytes: None,
            content_type: None,
        }
    }
}

/// Outcome of the image resolution pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub original_url: String,
    pub resolved_url: String,
    pub content_type: Option<String>,
    /// Name of the tier that produced the image
    pub source: String,
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_movie() -> CanonicalMovie {
        CanonicalMovie {
            id: "tmdb:155".to_string(),
            title: "The Dark Knight".to_string(),
            year: Some(2008),
            plot: None,
            poster_url: Some("https://image.tmdb.org/t/p/w500/qJ2tW6WMUDux911r6m7haRef0WH.jpg".into()),
            rating: Some(8.5),
            source: "tmdb".to_string(),
            runtime_minutes: Some(152),
        }
    }

    #[test]
    fn test_search_query_validation() {
        assert_eq!(SearchQuery::new("   ", 10), Err(QueryError::EmptyQuery));
        assert!(matches!(
            SearchQuery::new("batman", 0),
            Err(QueryError::InvalidLimit { got: 0, .. })
        ));
        assert!(matches!(
            SearchQuery::new("batman", 51),
            Err(QueryError::InvalidLimit { got: 51, .. })
        ));

        let query = SearchQuery::new("  Batman   Begins ", 5).unwrap();
        assert_eq!(query.text(), "Batman   Begins");
        assert_eq!(query.normalized_text(), "batman begins");
        assert_eq!(query.limit(), 5);
    }

    #[test]
    fn test_canonical_json_shape() {
        let json = serde_json::to_value(sample_movie()).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["id", "plot", "poster", "rating", "runtime", "source", "title", "year"]
        );
        assert_eq!(obj["runtime"], 152);
    }

    #[test]
    fn test_with_poster_leaves_original_untouched() {
        let movie = sample_movie();
        let replaced = movie.with_poster(Some("https://cdn.example/poster.jpg".into()));

        assert_eq!(replaced.poster_url.as_deref(), Some("https://cdn.example/poster.jpg"));
        assert!(movie.poster_url.as_deref().unwrap().contains("image.tmdb.org"));
        assert_eq!(replaced.id, movie.id);
    }

    #[test]
    fn test_image_reference_cache_key() {
        assert_eq!(
            ImageReference::new(" https://a/b.jpg ").cache_key().as_deref(),
            Some("https://a/b.jpg")
        );

        let mut movie = sample_movie();
        let with_id = ImageReference::for_movie(&movie).cache_key().unwrap();
        assert_eq!(
            with_id,
            format!("id:tmdb:155|{}", movie.poster_url.as_deref().unwrap())
        );

        // Same poster URL, different movie: separate entries
        let mut other = movie.clone();
        other.id = "imdb:tt0000001".to_string();
        assert_ne!(ImageReference::for_movie(&other).cache_key().unwrap(), with_id);

        movie.poster_url = None;
        assert_eq!(
            ImageReference::for_movie(&movie).cache_key().as_deref(),
            Some("id:tmdb:155")
        );

        assert_eq!(ImageReference::new("").cache_key(), None);
    }

    #[test]
    fn test_listing_keys() {
        assert_eq!(Listing::Popular.cache_key(20), "popular:20");
        assert_eq!(Listing::Genre(" Horror ".into()).cache_key(5), "genre:horror:5");
    }
}
