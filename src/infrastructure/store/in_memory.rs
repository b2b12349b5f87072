//! In-memory key-value store using moka
//!
//! Single-process stand-in for Redis: the same key schema and the same
//! atomic window counter. Moka owns eviction (capacity bound plus per-entry
//! TTL through [`Expiry`]); reads also check a tokio deadline so paused-time
//! tests drive expiry.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use regex::Regex;
use tokio::time::Instant;

use crate::domain::store::{HashRecord, KeyValueStore, WindowCount};
use crate::domain::DomainError;

pub const DEFAULT_MAX_ENTRIES: u64 = 100_000;

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Hash(HashRecord),
    Counter(u64),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(value: StoredValue, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn is_live(&self) -> bool {
        !self.is_expired(Instant::now())
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// Hands each entry's own deadline to moka
struct EntryExpiry;

impl Expiry<String, StoredEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        value.time_to_live()
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.time_to_live()
    }
}

/// Thread-safe in-memory store
///
/// Per-key read-modify-write (`hset`, `expire`, `increment_window`) runs
/// through moka's `and_compute_with`, which serializes callers on the same
/// key.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: MokaCache<String, StoredEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    /// Creates a store holding at most `max_entries` keys
    pub fn with_capacity(max_entries: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();

        Self { entries }
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries physically held, after moka has applied pending evictions
    pub async fn resident_entries(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    async fn live(&self, key: &str) -> Option<StoredEntry> {
        self.entries.get(key).await.filter(StoredEntry::is_live)
    }

    fn wrong_type(key: &str) -> DomainError {
        DomainError::store(format!(
            "WRONGTYPE operation against key '{}' holding the wrong kind of value",
            key
        ))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a glob with `*` wildcards into an anchored regex
fn glob_to_regex(pattern: &str) -> Result<Regex, DomainError> {
    let escaped = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| DomainError::validation(format!("Invalid key pattern '{}': {}", pattern, e)))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.live(key).await.map(|entry| entry.value) {
            Some(StoredValue::Text(text)) => Ok(Some(text)),
            Some(StoredValue::Counter(count)) => Ok(Some(count.to_string())),
            Some(StoredValue::Hash(_)) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        self.entries
            .insert(
                key.to_string(),
                StoredEntry::new(StoredValue::Text(value.to_string()), Some(ttl)),
            )
            .await;
        Ok(())
    }

    async fn hset(&self, key: &str, fields: &[(&str, &[u8])]) -> Result<(), DomainError> {
        let result = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let current = current
                    .map(|entry| entry.into_value())
                    .filter(StoredEntry::is_live);

                let op = match current {
                    None => {
                        let mut record = HashRecord::new();
                        merge_fields(&mut record, fields);
                        Op::Put(StoredEntry::new(StoredValue::Hash(record), None))
                    }
                    Some(StoredEntry {
                        value: StoredValue::Hash(mut record),
                        expires_at,
                    }) => {
                        merge_fields(&mut record, fields);
                        Op::Put(StoredEntry {
                            value: StoredValue::Hash(record),
                            expires_at,
                        })
                    }
                    Some(_) => Op::Nop,
                };

                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::Unchanged(_) => Err(Self::wrong_type(key)),
            _ => Ok(()),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashRecord, DomainError> {
        match self.live(key).await.map(|entry| entry.value) {
            Some(StoredValue::Hash(record)) => Ok(record),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(HashRecord::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, DomainError> {
        let result = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current.map(|entry| entry.into_value()) {
                    Some(mut entry) if entry.is_live() => {
                        entry.expires_at = Some(Instant::now() + ttl);
                        Op::Put(entry)
                    }
                    _ => Op::Nop,
                };

                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let regex = glob_to_regex(pattern)?;
        let now = Instant::now();

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && regex.is_match(key))
            .map(|(key, _)| (*key).clone())
            .collect();
        keys.sort();

        Ok(keys)
    }

    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowCount, DomainError> {
        let result = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let now = Instant::now();
                let current = current
                    .map(|entry| entry.into_value())
                    .filter(|entry| !entry.is_expired(now));

                let op = match current {
                    None => Op::Put(StoredEntry {
                        value: StoredValue::Counter(1),
                        expires_at: Some(now + window),
                    }),
                    Some(StoredEntry {
                        value: StoredValue::Counter(count),
                        expires_at,
                    }) => {
                        // Rejections past the first stop counting
                        let count = count.saturating_add(1).min(limit.saturating_add(1));
                        Op::Put(StoredEntry {
                            value: StoredValue::Counter(count),
                            expires_at: expires_at.or(Some(now + window)),
                        })
                    }
                    Some(_) => Op::Nop,
                };

                std::future::ready(op)
            })
            .await;

        let entry = match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => entry.into_value(),
            _ => return Err(Self::wrong_type(key)),
        };

        let count = match entry.value {
            StoredValue::Counter(count) => count,
            _ => return Err(Self::wrong_type(key)),
        };

        Ok(WindowCount {
            count,
            allowed: count <= limit,
            reset_in: entry.time_to_live().unwrap_or(window),
        })
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), DomainError> {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        Ok(())
    }
}

fn merge_fields(record: &mut HashRecord, fields: &[(&str, &[u8])]) {
    for (name, value) in fields {
        record.insert((*name).to_string(), value.to_vec());
    }
}
