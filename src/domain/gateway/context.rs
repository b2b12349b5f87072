//! Per-request context threaded through the gateway pipeline

use std::fmt;

use axum::http::Method;
use serde_json::Value;

use crate::domain::cache::CacheTier;

/// Header carrying the cache hit/miss marker
pub const CACHE_HIT_HEADER: &str = "x-cache-hit";

/// Header carrying the tier that served a hit
pub const CACHE_TIER_HEADER: &str = "x-cache-tier";

/// Cache outcome for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Not eligible for caching (non-POST or no extractable prompt)
    Bypass,
    Hit(CacheTier),
    Miss,
}

impl CacheStatus {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Value of the `x-cache-hit` marker
    pub fn marker(&self) -> &'static str {
        if self.is_hit() { "true" } else { "false" }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bypass => write!(f, "bypass"),
            Self::Hit(tier) => write!(f, "hit:{}", tier),
            Self::Miss => write!(f, "miss"),
        }
    }
}

/// Request-scoped state: identity, extracted prompt and cache outcome
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    /// Normalized client address, when known
    pub client_id: Option<String>,
    pub prompt: Option<String>,
    pub cache_status: CacheStatus,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            path: path.into(),
            client_id: None,
            prompt: None,
            cache_status: CacheStatus::Bypass,
        }
    }

    /// Only POST requests take part in caching
    pub fn is_cache_eligible(&self) -> bool {
        self.method == Method::POST
    }

    pub fn with_client(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }
}

/// Extract the cache prompt from a JSON request body
///
/// The textual form of the `messages` field is the prompt: strings are used
/// as-is, any other JSON value in its compact serialization. Bodies that are
/// not JSON, or carry no `messages` field, yield `None` (cache bypass).
pub fn extract_prompt(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;

    match value.get("messages")? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
