//! Rate limit configuration

use std::time::Duration;

use serde::Deserialize;

/// How the limiter behaves when the store transaction fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Reject the request (protect the upstream)
    #[default]
    Closed,
    /// Admit the request (favor availability)
    Open,
}

/// Fixed-window rate limit policy
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests admitted per client per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Use the first X-Forwarded-For entry as the client identity
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> u64 {
    5
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_limit(),
            window_secs: default_window_secs(),
            failure_mode: FailureMode::default(),
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window_secs: window.as_secs().max(1),
            ..Default::default()
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.max(1))
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
