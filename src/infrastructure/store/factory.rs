//! Store factory for runtime backend selection

use std::sync::Arc;

use crate::domain::store::KeyValueStore;
use crate::domain::DomainError;

use super::in_memory::{InMemoryStore, DEFAULT_MAX_ENTRIES};
use super::redis::{RedisStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StoreType {
    /// Shared Redis instance (multi-replica deployments)
    #[default]
    Redis,
    /// Process-local store
    InMemory,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Redis => write!(f, "redis"),
            StoreType::InMemory => write!(f, "in_memory"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreType::Redis),
            "in_memory" | "inmemory" | "memory" => Ok(StoreType::InMemory),
            _ => Err(DomainError::configuration(format!(
                "Unknown store backend: {}. Valid backends: redis, in_memory",
                s
            ))),
        }
    }
}

/// Configuration for the store factory
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub store_type: StoreType,
    /// Redis URL (required for the Redis backend)
    pub redis_url: Option<String>,
    /// Key bound for the in-memory backend
    pub max_entries: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            redis_url: None,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            store_type: StoreType::InMemory,
            ..Self::default()
        }
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            store_type: StoreType::Redis,
            redis_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Factory for creating store instances
#[derive(Debug, Default)]
pub struct StoreFactory;

impl StoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Opens the configured backend
    pub async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, DomainError> {
        match config.store_type {
            StoreType::InMemory => Ok(Arc::new(InMemoryStore::with_capacity(config.max_entries))),
            StoreType::Redis => {
                let url = config
                    .redis_url
                    .clone()
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| {
                        DomainError::configuration("Redis URL is required for the redis store")
                    })?;

                let store = RedisStore::new(RedisStoreConfig::new(url)).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
