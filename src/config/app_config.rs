use std::time::Duration;

use serde::Deserialize;

use crate::domain::rate_limit::RateLimitConfig;
use crate::domain::DomainError;
use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub write_back: WriteBackSettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// The LLM API every request is forwarded to
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API; required
    #[serde(default)]
    pub target_url: Option<String>,
    /// Replaces whatever credential the client sent
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// `redis` or `in_memory`
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: Option<String>,
    /// Wipe the store before serving
    #[serde(default)]
    pub flush_on_start: bool,
    /// Key bound for the in-memory backend
    #[serde(default = "default_store_max_entries")]
    pub max_entries: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_exact_ttl_secs")]
    pub exact_ttl_secs: u64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Vector records never expire when unset
    #[serde(default)]
    pub vector_ttl_secs: Option<u64>,
    #[serde(default = "default_shortlist_capacity")]
    pub shortlist_capacity: u64,
    #[serde(default = "default_shortlist_ttl_secs")]
    pub shortlist_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteBackSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_upstream_timeout_secs() -> u64 {
    120
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    15
}

fn default_store_backend() -> String {
    "redis".to_string()
}

fn default_redis_url() -> Option<String> {
    Some("redis://127.0.0.1:6379".to_string())
}

fn default_store_max_entries() -> u64 {
    100_000
}

fn default_exact_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_similarity_threshold() -> f32 {
    0.8
}

fn default_shortlist_capacity() -> u64 {
    10_000
}

fn default_shortlist_ttl_secs() -> u64 {
    300
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_drain_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            api_key: String::new(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            api_key: String::new(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
            flush_on_start: false,
            max_entries: default_store_max_entries(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exact_ttl_secs: default_exact_ttl_secs(),
            similarity_threshold: default_similarity_threshold(),
            vector_ttl_secs: None,
            shortlist_capacity: default_shortlist_capacity(),
            shortlist_ttl_secs: default_shortlist_ttl_secs(),
        }
    }
}

impl Default for WriteBackSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject configurations the gateway cannot start with
    pub fn validate(&self) -> Result<(), DomainError> {
        let target = self
            .upstream
            .target_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DomainError::configuration("upstream.target_url is required"))?;

        let parsed: axum::http::Uri = target.parse().map_err(|e| {
            DomainError::configuration(format!("upstream.target_url is invalid: {}", e))
        })?;

        if !matches!(parsed.scheme_str(), Some("http") | Some("https")) || parsed.host().is_none() {
            return Err(DomainError::configuration(format!(
                "upstream.target_url must be an absolute http(s) URL: {}",
                target
            )));
        }

        if !(-1.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(DomainError::configuration(format!(
                "cache.similarity_threshold must be within [-1, 1], got {}",
                self.cache.similarity_threshold
            )));
        }

        if self.rate_limit.enabled && self.rate_limit.limit == 0 {
            return Err(DomainError::configuration(
                "rate_limit.limit must be greater than zero",
            ));
        }

        Ok(())
    }
}
