//! Vector store infrastructure

mod kv_store;

pub use kv_store::{KvVectorStore, KvVectorStoreConfig};
