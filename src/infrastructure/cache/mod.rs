//! Cache infrastructure - Two-tier response cache

mod manager;

pub use manager::{CacheManager, CacheManagerConfig};
