//! Backing store domain - the shared key-value store abstraction

mod repository;

pub use repository::{HashRecord, KeyValueStore, WindowCount};

#[cfg(test)]
pub use repository::mock::UnavailableStore;
