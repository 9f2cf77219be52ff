use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::CacheError;

/// A single cached value with its expiry.
///
/// An entry is logically absent once `now >= expires_at`, whether or not it
/// has been physically removed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, ttl: Duration) -> Result<Self, CacheError> {
        Self::created_at(value, ttl, Utc::now())
    }

    pub fn created_at(
        value: Vec<u8>,
        ttl: Duration,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| CacheError::InvalidTtl)?;
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or(CacheError::InvalidTtl)?;

        Ok(Self {
            value,
            created_at,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_rejected() {
        assert_eq!(
            CacheEntry::new(b"v".to_vec(), Duration::ZERO),
            Err(CacheError::InvalidTtl)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let created = Utc::now();
        let entry = CacheEntry::created_at(b"v".to_vec(), Duration::from_secs(60), created).unwrap();

        assert_eq!(entry.expires_at - entry.created_at, chrono::Duration::seconds(60));
        assert!(!entry.is_expired_at(created));
        assert!(!entry.is_expired_at(created + chrono::Duration::seconds(59)));
        // Absent exactly at expires_at, not one tick later
        assert!(entry.is_expired_at(created + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_huge_ttl_rejected_instead_of_overflowing() {
        assert_eq!(
            CacheEntry::new(Vec::new(), Duration::from_secs(u64::MAX)),
            Err(CacheError::InvalidTtl)
        );
    }
}
