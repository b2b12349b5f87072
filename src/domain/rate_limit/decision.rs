//! Rate limit counters and admission decisions

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::store::WindowCount;

/// Key namespace for rate-limit counters
pub const LIMIT_KEY_PREFIX: &str = "limit:";

/// Per-client counter state for the current window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitCounter {
    pub client_id: String,
    pub count: u64,
    pub window_expires_at: DateTime<Utc>,
}

impl RateLimitCounter {
    pub fn store_key(client_id: &str) -> String {
        format!("{}{}", LIMIT_KEY_PREFIX, client_id)
    }

    pub fn from_window(client_id: impl Into<String>, window: &WindowCount) -> Self {
        let reset = chrono::Duration::from_std(window.reset_in).unwrap_or_default();

        Self {
            client_id: client_id.into(),
            count: window.count,
            window_expires_at: Utc::now() + reset,
        }
    }
}

/// Why a request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The window's request budget is spent
    LimitExceeded,
    /// The store transaction failed and the limiter fails closed
    StoreUnavailable,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitExceeded => write!(f, "limit_exceeded"),
            Self::StoreUnavailable => write!(f, "store_unavailable"),
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Total limit for the window
    pub limit: u64,
    /// Remaining requests in the current window
    pub remaining: u64,
    /// Time until the window resets (in seconds)
    pub reset_in_seconds: u64,
    /// Why the request was rejected (if it was)
    pub deny_reason: Option<DenyReason>,
}

impl RateLimitDecision {
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: u64::MAX,
            remaining: u64::MAX,
            reset_in_seconds: 0,
            deny_reason: None,
        }
    }

    pub fn from_window(limit: u64, window: &WindowCount) -> Self {
        Self {
            allowed: window.allowed,
            limit,
            remaining: limit.saturating_sub(window.count),
            reset_in_seconds: window.reset_in.as_secs(),
            deny_reason: (!window.allowed).then_some(DenyReason::LimitExceeded),
        }
    }

    pub fn store_unavailable(limit: u64, allowed: bool) -> Self {
        Self {
            allowed,
            limit,
            remaining: 0,
            reset_in_seconds: 0,
            deny_reason: (!allowed).then_some(DenyReason::StoreUnavailable),
        }
    }
}
