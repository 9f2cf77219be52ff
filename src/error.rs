// Error types shared by the cache, the source adapters and the normalizer

use thiserror::Error;

/// Failure reported by a source adapter.
///
/// Adapters never panic or leak transport errors past their boundary; every
/// failure is folded into one of these kinds so the fallback pipeline can
/// decide whether to retry and when to move on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("upstream timed out")]
    Timeout,

    #[error("upstream rate limited the request")]
    RateLimited,

    /// Missing credential or unreachable host
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream server error: HTTP {0}")]
    Server(u16),

    #[error("connection failed: {0}")]
    Connection(String),

    /// 4xx other than 429; retrying will not help
    #[error("upstream rejected the request: HTTP {0}")]
    Rejected(u16),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("capability not supported by this adapter")]
    Unsupported,
}

impl SourceError {
    /// Whether the shared retry policy should try the call again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Timeout
                | SourceError::RateLimited
                | SourceError::Server(_)
                | SourceError::Connection(_)
        )
    }

    /// Map an HTTP status to an error kind, `None` for success statuses
    pub fn from_status(status: reqwest::StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        let code = status.as_u16();
        Some(match code {
            429 => SourceError::RateLimited,
            408 | 504 => SourceError::Timeout,
            500..=599 => SourceError::Server(code),
            _ => SourceError::Rejected(code),
        })
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::from_status(status).unwrap_or_else(|| SourceError::Connection(err.to_string()))
        } else {
            SourceError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

/// Reason a raw provider record was discarded during normalization
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("record has an empty title")]
    EmptyTitle,

    #[error("record has a placeholder title: {0:?}")]
    PlaceholderTitle(String),

    #[error("record has no usable identifier")]
    MissingId,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("ttl must be greater than zero")]
    InvalidTtl,

    /// Durable tier unreachable; callers degrade to memory-only operation
    #[error("cache tier unavailable: {0}")]
    Unavailable(String),

    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Caller input rejected before any provider is touched
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("query text must not be empty")]
    EmptyQuery,

    #[error("limit must be between 1 and {max}, got {got}")]
    InvalidLimit { got: usize, max: usize },

    #[error("movie id must not be empty")]
    EmptyId,
}
