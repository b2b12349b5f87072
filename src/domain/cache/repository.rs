//! Response cache trait definition

use std::fmt::{self, Debug};

use async_trait::async_trait;

/// Which tier served a cache hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Exact digest match
    Exact,
    /// Vector similarity match
    Vector,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Vector => write!(f, "vector"),
        }
    }
}

/// Outcome of a two-tier cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit { response: String, tier: CacheTier },
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Hit { response, .. } => Some(response),
            Self::Miss => None,
        }
    }

    pub fn tier(&self) -> Option<CacheTier> {
        match self {
            Self::Hit { tier, .. } => Some(*tier),
            Self::Miss => None,
        }
    }
}

/// What a cache population actually persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePopulation {
    pub exact_written: bool,
    pub vector_written: bool,
}

/// Two-tier response cache consulted by the gateway
///
/// Lookups fail open (any dependency failure is a miss) and writes are
/// best-effort, so neither method returns an error.
#[async_trait]
pub trait ResponseCache: Send + Sync + Debug {
    /// Look up a response for the prompt, cheapest tier first
    async fn get_response(&self, prompt: &str) -> CacheLookup;

    /// Populate both tiers for the prompt; tiers are written independently
    async fn set_response(&self, prompt: &str, response: &str) -> CachePopulation;
}
