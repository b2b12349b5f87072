//! Vector store trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use super::{SearchOutcome, VectorRecord};
use crate::domain::DomainError;

/// Key namespace for vector records
pub const VECTOR_KEY_PREFIX: &str = "vec:";

/// Storage and nearest-match search over vector records
#[async_trait]
pub trait VectorStore: Send + Sync + Debug {
    /// Persist a record under its id, overwriting any previous record
    async fn add(&self, record: VectorRecord) -> Result<(), DomainError>;

    /// Find the stored record most similar to `query` whose similarity is at
    /// least `threshold`. Ties keep the first record reaching the maximum.
    async fn search(&self, query: &[f32], threshold: f32) -> Result<SearchOutcome, DomainError>;
}
