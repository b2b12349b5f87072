//! Cache domain - exact and semantic response caching

mod entry;
mod key;
mod repository;

pub use entry::{ExactCacheEntry, EXACT_KEY_PREFIX};
pub use key::{normalize_prompt, CacheKey};
pub use repository::{CacheLookup, CachePopulation, CacheTier, ResponseCache};
