//! Vector store over the shared key-value store
//!
//! Records live in hash entries at `vec:<id>` with the fields `vec`
//! (little-endian f32 bytes), `res` (response) and `p` (prompt).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::domain::store::{HashRecord, KeyValueStore};
use crate::domain::vector::{
    cosine_similarity, encoding, SearchOutcome, VectorRecord, VectorStore, VECTOR_KEY_PREFIX,
};
use crate::domain::DomainError;

const FIELD_VECTOR: &str = "vec";
const FIELD_RESPONSE: &str = "res";
const FIELD_PROMPT: &str = "p";

/// Configuration for the key-value backed vector store
#[derive(Debug, Clone)]
pub struct KvVectorStoreConfig {
    /// Expiry for vector records; `None` keeps them until the store is flushed
    pub record_ttl: Option<Duration>,
    /// Maximum number of decoded records kept in process
    pub shortlist_capacity: u64,
    /// How long a decoded record stays in process
    pub shortlist_ttl: Duration,
}

impl Default for KvVectorStoreConfig {
    fn default() -> Self {
        Self {
            record_ttl: None,
            shortlist_capacity: 10_000,
            shortlist_ttl: Duration::from_secs(300),
        }
    }
}

impl KvVectorStoreConfig {
    pub fn with_record_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.record_ttl = ttl;
        self
    }

    pub fn with_shortlist_capacity(mut self, capacity: u64) -> Self {
        self.shortlist_capacity = capacity;
        self
    }

    pub fn with_shortlist_ttl(mut self, ttl: Duration) -> Self {
        self.shortlist_ttl = ttl;
        self
    }
}

/// Linear-scan vector store
///
/// Search enumerates every `vec:*` key and scores each record. A record only
/// changes when its prompt is written again, so decoded copies are kept in a
/// bounded moka shortlist to skip the fetch and decode on later scans. The
/// shortlist TTL bounds staleness after an overwrite from another replica.
pub struct KvVectorStore {
    store: Arc<dyn KeyValueStore>,
    shortlist: MokaCache<String, Arc<VectorRecord>>,
    config: KvVectorStoreConfig,
}

impl fmt::Debug for KvVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvVectorStore")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

impl KvVectorStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, KvVectorStoreConfig::default())
    }

    pub fn with_config(store: Arc<dyn KeyValueStore>, config: KvVectorStoreConfig) -> Self {
        let shortlist = MokaCache::builder()
            .max_capacity(config.shortlist_capacity)
            .time_to_live(config.shortlist_ttl)
            .build();

        Self {
            store,
            shortlist,
            config,
        }
    }

    fn record_key(record: &VectorRecord) -> String {
        record.id().namespaced(VECTOR_KEY_PREFIX)
    }

    /// Rebuild a record from its hash fields
    fn parse_record(key: &str, fields: &HashRecord) -> Result<VectorRecord, DomainError> {
        let raw = fields
            .get(FIELD_VECTOR)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| DomainError::validation(format!("record '{}' has no vector", key)))?;

        let vector = encoding::try_decode(raw)?;

        let text = |field: &str| {
            fields
                .get(field)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default()
        };

        Ok(VectorRecord::new(
            text(FIELD_PROMPT),
            text(FIELD_RESPONSE),
            vector,
        ))
    }

    async fn load(&self, key: &str) -> Result<Option<Arc<VectorRecord>>, DomainError> {
        if let Some(record) = self.shortlist.get(key).await {
            return Ok(Some(record));
        }

        let fields = self.store.hgetall(key).await?;
        if fields.is_empty() {
            // Expired or deleted between the scan and the fetch
            return Ok(None);
        }

        match Self::parse_record(key, &fields) {
            Ok(record) => {
                let record = Arc::new(record);
                self.shortlist.insert(key.to_string(), record.clone()).await;
                Ok(Some(record))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping unreadable vector record");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl VectorStore for KvVectorStore {
    async fn add(&self, record: VectorRecord) -> Result<(), DomainError> {
        let key = Self::record_key(&record);
        let vector_bytes = encoding::encode(record.vector());

        self.store
            .hset(
                &key,
                &[
                    (FIELD_VECTOR, vector_bytes.as_slice()),
                    (FIELD_RESPONSE, record.response().as_bytes()),
                    (FIELD_PROMPT, record.prompt().as_bytes()),
                ],
            )
            .await?;

        if let Some(ttl) = self.config.record_ttl {
            self.store.expire(&key, ttl).await?;
        }

        self.shortlist.invalidate(&key).await;

        debug!(key = %key, dimensions = record.dimensions(), "Stored vector record");
        Ok(())
    }

    async fn search(&self, query: &[f32], threshold: f32) -> Result<SearchOutcome, DomainError> {
        let pattern = format!("{}*", VECTOR_KEY_PREFIX);
        let keys = self.store.keys(&pattern).await?;

        let mut best: Option<(f32, Arc<VectorRecord>)> = None;

        for key in &keys {
            let record = match self.load(key).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping vector record that failed to load");
                    continue;
                }
            };

            let similarity = cosine_similarity(query, record.vector());

            // Strict comparison keeps the first record that reached the max
            if best.as_ref().is_none_or(|(s, _)| similarity > *s) {
                best = Some((similarity, record));
            }
        }

        let outcome = match best {
            Some((similarity, record)) if similarity >= threshold => {
                SearchOutcome::hit(record.response(), similarity)
            }
            Some((similarity, _)) => SearchOutcome::miss(similarity),
            None => SearchOutcome::miss(0.0),
        };

        debug!(
            candidates = keys.len(),
            similarity = outcome.similarity,
            threshold,
            found = outcome.found,
            "Vector search complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::UnavailableStore;
    use crate::infrastructure::store::InMemoryStore;

    fn store() -> (Arc<InMemoryStore>, KvVectorStore) {
        let kv = Arc::new(InMemoryStore::new());
        let vectors = KvVectorStore::new(kv.clone());
        (kv, vectors)
    }

    /// Unit vector at the given cosine to [1, 0]
    fn at_similarity(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[tokio::test]
    async fn test_empty_store_search() {
        let (_, vectors) = store();

        let outcome = vectors.search(&[1.0, 0.0], 0.0).await.unwrap();

        assert!(!outcome.found);
        assert!(outcome.response.is_empty());
    }

    #[tokio::test]
    async fn test_add_writes_hash_fields() {
        let (kv, vectors) = store();
        let record = VectorRecord::new("prompt", "response", vec![1.0, 2.0]);
        let key = format!("vec:{}", record.id());

        vectors.add(record).await.unwrap();

        let fields = kv.hgetall(&key).await.unwrap();
        assert_eq!(fields.get("vec").unwrap(), &encoding::encode(&[1.0, 2.0]));
        assert_eq!(fields.get("res").unwrap(), b"response");
        assert_eq!(fields.get("p").unwrap(), b"prompt");
    }

    #[tokio::test]
    async fn test_add_is_idempotent_by_id() {
        let (kv, vectors) = store();

        vectors
            .add(VectorRecord::new("same", "first", vec![1.0, 0.0]))
            .await
            .unwrap();
        vectors
            .add(VectorRecord::new("same", "second", vec![1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(kv.keys("vec:*").await.unwrap().len(), 1);

        let outcome = vectors.search(&[1.0, 0.0], 0.5).await.unwrap();
        assert_eq!(outcome.response, "second");
    }

    #[tokio::test]
    async fn test_threshold_decides_hit() {
        let (_, vectors) = store();

        vectors
            .add(VectorRecord::new("p", "near", at_similarity(0.95)))
            .await
            .unwrap();

        let hit = vectors.search(&[1.0, 0.0], 0.8).await.unwrap();
        assert!(hit.found);
        assert_eq!(hit.response, "near");
        assert!((hit.similarity - 0.95).abs() < 1e-4);

        let miss = vectors.search(&[1.0, 0.0], 0.97).await.unwrap();
        assert!(!miss.found);
        assert!((miss.similarity - 0.95).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_search_picks_highest_similarity() {
        let (_, vectors) = store();

        vectors
            .add(VectorRecord::new("a", "lower", at_similarity(0.85)))
            .await
            .unwrap();
        vectors
            .add(VectorRecord::new("b", "higher", at_similarity(0.99)))
            .await
            .unwrap();
        vectors
            .add(VectorRecord::new("c", "unrelated", vec![0.0, 1.0]))
            .await
            .unwrap();

        let outcome = vectors.search(&[1.0, 0.0], 0.8).await.unwrap();

        assert!(outcome.found);
        assert_eq!(outcome.response, "higher");
    }

    #[tokio::test]
    async fn test_corrupt_records_are_skipped() {
        let (kv, vectors) = store();

        kv.hset("vec:broken", &[("vec", &[1u8, 2, 3][..]), ("res", b"bad")])
            .await
            .unwrap();
        kv.hset("vec:empty", &[("res", b"bad")]).await.unwrap();
        vectors
            .add(VectorRecord::new("ok", "good", vec![1.0, 0.0]))
            .await
            .unwrap();

        let outcome = vectors.search(&[1.0, 0.0], 0.8).await.unwrap();

        assert!(outcome.found);
        assert_eq!(outcome.response, "good");
    }

    #[tokio::test]
    async fn test_unreadable_key_does_not_abort_search() {
        let (kv, vectors) = store();

        vectors
            .add(VectorRecord::new("ok", "good", vec![1.0, 0.0]))
            .await
            .unwrap();
        // A plain string under the namespace fails the hash read
        kv.set_ex("vec:zzz-stray", "not a hash", Duration::from_secs(60))
            .await
            .unwrap();

        let outcome = vectors.search(&[1.0, 0.0], 0.8).await.unwrap();

        assert!(outcome.found);
        assert_eq!(outcome.response, "good");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_scores_zero() {
        let (_, vectors) = store();

        vectors
            .add(VectorRecord::new("p", "r", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let outcome = vectors.search(&[1.0, 0.0], 0.1).await.unwrap();

        assert!(!outcome.found);
        assert_eq!(outcome.similarity, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_ttl() {
        let kv = Arc::new(InMemoryStore::new());
        let config = KvVectorStoreConfig::default()
            .with_record_ttl(Some(Duration::from_secs(30)))
            .with_shortlist_capacity(0);
        let vectors = KvVectorStore::with_config(kv.clone(), config);

        vectors
            .add(VectorRecord::new("p", "r", vec![1.0, 0.0]))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(kv.keys("vec:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_error() {
        let vectors = KvVectorStore::new(Arc::new(UnavailableStore));

        assert!(vectors.search(&[1.0], 0.8).await.is_err());
        assert!(vectors
            .add(VectorRecord::new("p", "r", vec![1.0]))
            .await
            .is_err());
    }
}
