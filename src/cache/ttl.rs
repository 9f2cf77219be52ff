// Per-category TTL policy. The cache itself is category-agnostic; callers
// pick the TTL from here when they write.

use std::time::Duration;

pub const SUGGESTIONS_TTL: Duration = Duration::from_secs(10);
pub const POPULAR_TTL: Duration = Duration::from_secs(30 * 60);
pub const TRENDING_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const GENRE_TTL: Duration = Duration::from_secs(3 * 60 * 60);
pub const SEARCH_TTL: Duration = Duration::from_secs(60 * 60);
pub const MOVIE_DETAIL_TTL: Duration = Duration::from_secs(60 * 60);
pub const IMAGE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Suggestions,
    Popular,
    Trending,
    Genre,
    Search,
    MovieDetail,
    Image,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 7] = [
        CacheCategory::Suggestions,
        CacheCategory::Popular,
        CacheCategory::Trending,
        CacheCategory::Genre,
        CacheCategory::Search,
        CacheCategory::MovieDetail,
        CacheCategory::Image,
    ];

    /// Name used in config files and `CINEFETCH_TTL_<NAME>` variables
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Suggestions => "suggestions",
            CacheCategory::Popular => "popular",
            CacheCategory::Trending => "trending",
            CacheCategory::Genre => "genre",
            CacheCategory::Search => "search",
            CacheCategory::MovieDetail => "movie_detail",
            CacheCategory::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    pub suggestions: Duration,
    pub popular: Duration,
    pub trending: Duration,
    pub genre: Duration,
    pub search: Duration,
    pub movie_detail: Duration,
    pub image: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            suggestions: SUGGESTIONS_TTL,
            popular: POPULAR_TTL,
            trending: TRENDING_TTL,
            genre: GENRE_TTL,
            search: SEARCH_TTL,
            movie_detail: MOVIE_DETAIL_TTL,
            image: IMAGE_TTL,
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Suggestions => self.suggestions,
            CacheCategory::Popular => self.popular,
            CacheCategory::Trending => self.trending,
            CacheCategory::Genre => self.genre,
            CacheCategory::Search => self.search,
            CacheCategory::MovieDetail => self.movie_detail,
            CacheCategory::Image => self.image,
        }
    }

    /// Replace one category's TTL. Zero durations are ignored since the
    /// cache would reject every write made with them.
    pub fn with_override(mut self, category: CacheCategory, ttl: Duration) -> Self {
        if ttl.is_zero() {
            tracing::warn!("Ignoring zero TTL override for {}", category.as_str());
            return self;
        }
        let slot = match category {
            CacheCategory::Suggestions => &mut self.suggestions,
            CacheCategory::Popular => &mut self.popular,
            CacheCategory::Trending => &mut self.trending,
            CacheCategory::Genre => &mut self.genre,
            CacheCategory::Search => &mut self.search,
            CacheCategory::MovieDetail => &mut self.movie_detail,
            CacheCategory::Image => &mut self.image,
        };
        *slot = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ordering() {
        let policy = TtlPolicy::default();
        assert!(policy.suggestions < policy.popular);
        assert!(policy.popular < policy.trending);
        assert!(policy.trending < policy.genre);
        assert!(policy.image >= Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_override() {
        let policy = TtlPolicy::default()
            .with_override(CacheCategory::Search, Duration::from_secs(5))
            .with_override(CacheCategory::Popular, Duration::ZERO);

        assert_eq!(policy.ttl_for(CacheCategory::Search), Duration::from_secs(5));
        assert_eq!(policy.ttl_for(CacheCategory::Popular), POPULAR_TTL);
    }
}
