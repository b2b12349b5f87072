//! PMP AI Gateway
//!
//! A reverse proxy in front of an LLM API with:
//! - Two-tier response caching (exact digest and embedding similarity)
//! - Per-client fixed-window rate limiting in a shared store
//! - Upstream retries with exponential backoff
//! - Asynchronous cache write-back off the request path

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use domain::{EmbeddingProvider, ResponseCache};
use infrastructure::{
    cache::{CacheManager, CacheManagerConfig},
    embedding::{HttpClient, OpenAiEmbeddingProvider},
    rate_limit::RateLimiter,
    services::GatewayService,
    store::{StoreConfig, StoreFactory, StoreType},
    upstream::{RequestDirector, ReqwestTransport, RetryConfig, RetryingTransport},
    vector::{KvVectorStore, KvVectorStoreConfig},
    write_back::{WriteBackConfig, WriteBackQueue},
};
use tracing::{info, warn};

/// Create the application state with every component wired
///
/// Opens the store and starts the write-back workers, so it must run inside
/// a Tokio runtime.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let store_config = StoreConfig {
        store_type: config.store.backend.parse::<StoreType>()?,
        redis_url: config.store.redis_url.clone(),
        max_entries: config.store.max_entries,
    };
    info!(backend = %store_config.store_type, "Opening store");
    let store = StoreFactory::new().create(&store_config).await?;

    let embeddings = create_embedding_provider(config)?;

    let vector_config = KvVectorStoreConfig::default()
        .with_record_ttl(config.cache.vector_ttl_secs.map(Duration::from_secs))
        .with_shortlist_capacity(config.cache.shortlist_capacity)
        .with_shortlist_ttl(Duration::from_secs(config.cache.shortlist_ttl_secs));
    let vectors = Arc::new(KvVectorStore::with_config(store.clone(), vector_config));

    let cache_config = CacheManagerConfig::default()
        .with_enabled(config.cache.enabled)
        .with_exact_ttl(Duration::from_secs(config.cache.exact_ttl_secs))
        .with_similarity_threshold(config.cache.similarity_threshold);
    let cache: Arc<dyn ResponseCache> = Arc::new(CacheManager::new(
        store.clone(),
        vectors,
        embeddings,
        cache_config,
    ));

    let write_back = Arc::new(WriteBackQueue::start(
        cache.clone(),
        WriteBackConfig {
            workers: config.write_back.workers,
            queue_capacity: config.write_back.queue_capacity,
            drain_timeout: Duration::from_secs(config.write_back.drain_timeout_secs),
        },
    ));

    let transport = RetryingTransport::new(
        Arc::new(ReqwestTransport::new(config.upstream.timeout())?),
        RetryConfig::new(config.upstream.max_retries, config.upstream.backoff_base()),
    );

    let target_url = config.upstream.target_url.as_deref().unwrap_or_default();
    if config.upstream.api_key.is_empty() {
        warn!("upstream.api_key is empty, requests will carry an empty bearer token");
    }
    let director = RequestDirector::new(target_url, &config.upstream.api_key)?;
    info!(target = director.target_host(), "Upstream configured");

    let gateway = GatewayService::new(cache, transport, director, write_back);
    let rate_limiter = RateLimiter::new(store.clone(), config.rate_limit.clone());

    info!(
        cache_enabled = config.cache.enabled,
        similarity_threshold = config.cache.similarity_threshold,
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit = config.rate_limit.limit,
        window_secs = config.rate_limit.window_secs,
        max_retries = config.upstream.max_retries,
        "Gateway initialized"
    );

    Ok(AppState::new(
        Arc::new(gateway),
        Arc::new(rate_limiter),
        store,
    ))
}

fn create_embedding_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if config.embedding.api_key.is_empty() {
        warn!("embedding.api_key is empty, the similarity tier will likely miss");
    }

    let client = HttpClient::with_timeout(config.embedding.timeout())?;

    Ok(Arc::new(OpenAiEmbeddingProvider::with_endpoint(
        client,
        config.embedding.api_key.clone(),
        config.embedding.url.clone(),
        config.embedding.model.clone(),
    )))
}
