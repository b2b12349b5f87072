//! Vector tier domain - similarity, encoding and record storage

pub mod encoding;
mod record;
mod similarity;
mod store;

pub use record::{SearchOutcome, VectorRecord};
pub use similarity::cosine_similarity;
pub use store::{VectorStore, VECTOR_KEY_PREFIX};
