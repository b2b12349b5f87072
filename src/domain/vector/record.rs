//! Vector records stored in the semantic tier

use crate::domain::cache::CacheKey;

/// A stored (vector, response, prompt) record
///
/// The record id is always the cache key of its own prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    id: CacheKey,
    vector: Vec<f32>,
    response: String,
    prompt: String,
}

impl VectorRecord {
    /// Create a record, deriving its id from the prompt
    pub fn new(prompt: impl Into<String>, response: impl Into<String>, vector: Vec<f32>) -> Self {
        let prompt = prompt.into();

        Self {
            id: CacheKey::from_prompt(&prompt),
            vector,
            response: response.into(),
            prompt,
        }
    }

    pub fn id(&self) -> &CacheKey {
        &self.id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Result of a nearest-match search over the vector tier
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Response of the best match (empty when nothing cleared the threshold)
    pub response: String,
    /// Best similarity seen, even when below the threshold
    pub similarity: f32,
    /// Whether a record cleared the threshold
    pub found: bool,
}

impl SearchOutcome {
    pub fn hit(response: impl Into<String>, similarity: f32) -> Self {
        Self {
            response: response.into(),
            similarity,
            found: true,
        }
    }

    pub fn miss(best_similarity: f32) -> Self {
        Self {
            response: String::new(),
            similarity: best_similarity,
            found: false,
        }
    }
}
