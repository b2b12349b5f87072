//! Domain layer - Core types and traits of the gateway pipeline

pub mod cache;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod rate_limit;
pub mod store;
pub mod vector;

pub use cache::{CacheKey, CacheLookup, CachePopulation, CacheTier, ResponseCache};
pub use embedding::EmbeddingProvider;
pub use error::DomainError;
pub use gateway::{
    CacheStatus, RequestContext, UpstreamRequest, UpstreamResponse, UpstreamTransport,
};
pub use rate_limit::{FailureMode, RateLimitConfig, RateLimitDecision};
pub use store::{KeyValueStore, WindowCount};
pub use vector::{cosine_similarity, SearchOutcome, VectorRecord, VectorStore};
