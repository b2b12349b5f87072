//! Redis key-value store implementation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::info;

use crate::domain::store::{HashRecord, KeyValueStore, WindowCount};
use crate::domain::DomainError;

/// INCR the window counter, arm its expiry on the first hit, and compare
/// against the limit in one server-side step. The counter stops at
/// `limit + 1`; DECR keeps the TTL in place.
///
/// Returns `{allowed, count, ttl}`.
const FIXED_WINDOW_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
local ceiling = tonumber(ARGV[1]) + 1
if current > ceiling then
    current = redis.call('DECR', KEYS[1])
end
local ttl = redis.call('TTL', KEYS[1])
if ttl < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
    ttl = tonumber(ARGV[2])
end
if current > tonumber(ARGV[1]) then
    return {0, current, ttl}
end
return {1, current, ttl}
"#;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Batch size hint for SCAN
    pub scan_count: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            scan_count: 100,
        }
    }
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }
}

/// Redis-backed store
///
/// The `ConnectionManager` multiplexes one connection and reconnects on
/// failure; clones share it. The socket is released when the last clone is
/// dropped, and `close` makes every clone refuse further commands.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    window_script: Script,
    config: RedisStoreConfig,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Opens a managed connection to Redis
    pub async fn new(config: RedisStoreConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::store(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            window_script: Script::new(FIXED_WINDOW_SCRIPT),
            config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn with_url(url: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(RedisStoreConfig::new(url)).await
    }

    fn connection(&self) -> Result<ConnectionManager, DomainError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DomainError::store("Redis store is closed"));
        }
        Ok(self.connection.clone())
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection()?;

        conn.get(key)
            .await
            .map_err(|e| DomainError::store(format!("Failed to get key '{}': {}", key, e)))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let mut conn = self.connection()?;

        let _: () = conn
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(|e| DomainError::store(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn hset(&self, key: &str, fields: &[(&str, &[u8])]) -> Result<(), DomainError> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);

        for (name, value) in fields {
            cmd.arg(*name).arg(*value);
        }

        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| DomainError::store(format!("Failed to write hash '{}': {}", key, e)))
    }

    async fn hgetall(&self, key: &str) -> Result<HashRecord, DomainError> {
        let mut conn = self.connection()?;

        conn.hgetall(key)
            .await
            .map_err(|e| DomainError::store(format!("Failed to read hash '{}': {}", key, e)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, DomainError> {
        let mut conn = self.connection()?;

        conn.expire(key, ttl_secs(ttl) as i64).await.map_err(|e| {
            DomainError::store(format!("Failed to update TTL for key '{}': {}", key, e))
        })
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let mut conn = self.connection()?;
        let mut cursor = 0u64;
        let mut found = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    DomainError::store(format!(
                        "Failed to scan keys with pattern '{}': {}",
                        pattern, e
                    ))
                })?;

            found.extend(batch);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once across iterations
        found.sort();
        found.dedup();

        Ok(found)
    }

    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowCount, DomainError> {
        let mut conn = self.connection()?;

        let (allowed, count, ttl): (i64, i64, i64) = self
            .window_script
            .key(key)
            .arg(limit)
            .arg(ttl_secs(window))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::store(format!("Rate limit script failed for '{}': {}", key, e))
            })?;

        Ok(WindowCount {
            count: count.max(0) as u64,
            allowed: allowed == 1,
            reset_in: Duration::from_secs(ttl.max(0) as u64),
        })
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection()?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| DomainError::store(format!("Redis ping failed: {}", e)))?;

        Ok(())
    }

    async fn flush(&self) -> Result<(), DomainError> {
        let mut conn = self.connection()?;

        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| DomainError::store(format!("Failed to flush database: {}", e)))
    }

    async fn close(&self) -> Result<(), DomainError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(url = %redact_url(&self.config.url), "Closed Redis store");
        }
        Ok(())
    }
}

/// Drop credentials from a connection URL before logging it
fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{}://***@{}", scheme, host),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}
