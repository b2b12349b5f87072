//! Two-tier response cache
//!
//! Lookup order is cheapest first: an exact digest match in the store, then
//! an embedding of the prompt scored against the vector tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::cache::{
    normalize_prompt, CacheKey, CacheLookup, CachePopulation, CacheTier, ExactCacheEntry,
    ResponseCache, EXACT_KEY_PREFIX,
};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::store::KeyValueStore;
use crate::domain::vector::{VectorRecord, VectorStore};
use crate::infrastructure::observability::{record_cache_degraded, record_cache_lookup};

/// Configuration for the cache manager
#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    /// When disabled every lookup is a miss and nothing is written
    pub enabled: bool,
    /// Lifetime of exact-tier entries
    pub exact_ttl: Duration,
    /// Minimum cosine similarity for a vector-tier hit
    pub similarity_threshold: f32,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exact_ttl: Duration::from_secs(24 * 60 * 60),
            similarity_threshold: 0.8,
        }
    }
}

impl CacheManagerConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_exact_ttl(mut self, ttl: Duration) -> Self {
        self.exact_ttl = ttl;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(-1.0, 1.0);
        self
    }
}

/// Cache manager over the shared store, a vector store and an embedding provider
#[derive(Debug)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    vectors: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    config: CacheManagerConfig,
}

impl CacheManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        vectors: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: CacheManagerConfig,
    ) -> Self {
        Self {
            store,
            vectors,
            embeddings,
            config,
        }
    }

    pub fn config(&self) -> &CacheManagerConfig {
        &self.config
    }

    async fn lookup_exact(&self, key: &CacheKey) -> Option<String> {
        let store_key = key.namespaced(EXACT_KEY_PREFIX);

        match self.store.get(&store_key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %store_key, error = %e, "Exact cache lookup failed, treating as miss");
                record_cache_degraded("store");
                None
            }
        }
    }

    async fn embed(&self, prompt: &str) -> Option<Vec<f32>> {
        match self.embeddings.embed(prompt).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => {
                warn!(provider = self.embeddings.provider_name(), "Embedding came back empty");
                record_cache_degraded("embedding");
                None
            }
            Err(e) => {
                warn!(
                    provider = self.embeddings.provider_name(),
                    error = %e,
                    "Embedding failed, skipping vector tier"
                );
                record_cache_degraded("embedding");
                None
            }
        }
    }

    async fn lookup_vector(&self, prompt: &str) -> Option<String> {
        let query = self.embed(prompt).await?;

        match self
            .vectors
            .search(&query, self.config.similarity_threshold)
            .await
        {
            Ok(outcome) if outcome.found => {
                debug!(similarity = outcome.similarity, "Vector tier match");
                Some(outcome.response)
            }
            Ok(outcome) => {
                debug!(
                    best_similarity = outcome.similarity,
                    threshold = self.config.similarity_threshold,
                    "No vector record cleared the threshold"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Vector search failed, treating as miss");
                record_cache_degraded("store");
                None
            }
        }
    }

    async fn write_exact(&self, key: &CacheKey, response: &str) -> bool {
        let entry = ExactCacheEntry::new(key.clone(), response, self.config.exact_ttl);

        match self
            .store
            .set_ex(&entry.store_key(), entry.response(), entry.ttl())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %entry.store_key(), error = %e, "Failed to write exact cache entry");
                false
            }
        }
    }

    async fn write_vector(&self, prompt: &str, response: &str) -> bool {
        let Some(vector) = self.embed(prompt).await else {
            return false;
        };

        match self.vectors.add(VectorRecord::new(prompt, response, vector)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to write vector record");
                false
            }
        }
    }
}

#[async_trait]
impl ResponseCache for CacheManager {
    async fn get_response(&self, prompt: &str) -> CacheLookup {
        if !self.config.enabled {
            return CacheLookup::Miss;
        }

        let prompt = normalize_prompt(prompt);
        let key = CacheKey::from_prompt(prompt);

        let lookup = if let Some(response) = self.lookup_exact(&key).await {
            CacheLookup::Hit {
                response,
                tier: CacheTier::Exact,
            }
        } else if let Some(response) = self.lookup_vector(prompt).await {
            CacheLookup::Hit {
                response,
                tier: CacheTier::Vector,
            }
        } else {
            CacheLookup::Miss
        };

        record_cache_lookup(lookup.tier());

        if let Some(tier) = lookup.tier() {
            info!(key = %key, tier = %tier, "Cache hit");
        }

        lookup
    }

    async fn set_response(&self, prompt: &str, response: &str) -> CachePopulation {
        if !self.config.enabled {
            return CachePopulation::default();
        }

        let prompt = normalize_prompt(prompt);
        let key = CacheKey::from_prompt(prompt);

        // Each tier is written on its own; one failing never blocks the other
        let exact_written = self.write_exact(&key, response).await;
        let vector_written = self.write_vector(prompt, response).await;

        debug!(key = %key, exact_written, vector_written, "Cache populated");

        CachePopulation {
            exact_written,
            vector_written,
        }
    }
}
