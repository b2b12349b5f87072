//! Key-value store trait definition

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Fields of a hash-structured record (binary-safe values)
pub type HashRecord = HashMap<String, Vec<u8>>;

/// Result of an atomic fixed-window increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Counter value after this increment
    pub count: u64,
    /// Whether the count is within the limit
    pub allowed: bool,
    /// Time until the window key expires
    pub reset_in: Duration,
}

/// Shared key-value store backing the cache tiers and the rate limiter
///
/// All cross-request mutation goes through the store's own atomicity;
/// callers hold no locks of their own.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Gets a string value
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a string value with a TTL
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Writes the given fields of a hash record, creating it if needed
    async fn hset(&self, key: &str, fields: &[(&str, &[u8])]) -> Result<(), DomainError>;

    /// Reads every field of a hash record (empty when the key is absent)
    async fn hgetall(&self, key: &str) -> Result<HashRecord, DomainError>;

    /// Updates the TTL of an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, DomainError>;

    /// Enumerates keys matching a glob pattern (only `*` is special)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DomainError>;

    /// Atomically increments a window counter, starting its expiry on the
    /// first increment, and checks it against `limit` in the same step
    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowCount, DomainError>;

    /// Checks connectivity
    async fn ping(&self) -> Result<(), DomainError>;

    /// Removes every key
    async fn flush(&self) -> Result<(), DomainError>;

    /// Releases the store handle
    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
