//! Exact-tier cache entry

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::CacheKey;

/// Key namespace for exact-tier entries
pub const EXACT_KEY_PREFIX: &str = "exact:";

/// An exact-match cache entry; expiry is managed by the store
#[derive(Debug, Clone)]
pub struct ExactCacheEntry {
    key: CacheKey,
    response: String,
    ttl: Duration,
    expires_at: DateTime<Utc>,
}

impl ExactCacheEntry {
    pub fn new(key: CacheKey, response: impl Into<String>, ttl: Duration) -> Self {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));

        Self {
            key,
            response: response.into(),
            ttl,
            expires_at,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The namespaced key this entry is stored under
    pub fn store_key(&self) -> String {
        self.key.namespaced(EXACT_KEY_PREFIX)
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
