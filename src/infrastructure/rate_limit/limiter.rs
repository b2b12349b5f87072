//! Fixed-window rate limiter
//!
//! The counter lives in the shared store so every gateway replica enforces
//! one budget per client. Increment, expiry and comparison happen in a single
//! store-side step.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::domain::rate_limit::{
    FailureMode, RateLimitConfig, RateLimitCounter, RateLimitDecision,
};
use crate::domain::store::KeyValueStore;
use crate::infrastructure::observability::record_rate_limit_rejection;

/// Rate limiter keyed by client identity
#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count this request against the client's window and decide admission
    pub async fn admit(&self, client_id: &str) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::unlimited();
        }

        let key = RateLimitCounter::store_key(client_id);

        let decision = match self
            .store
            .increment_window(&key, self.config.limit, self.config.window())
            .await
        {
            Ok(window) => {
                let counter = RateLimitCounter::from_window(client_id, &window);
                debug!(
                    client_id = %counter.client_id,
                    count = counter.count,
                    window_expires_at = %counter.window_expires_at,
                    "Rate limit window updated"
                );
                RateLimitDecision::from_window(self.config.limit, &window)
            }
            Err(e) => {
                let allowed = self.config.failure_mode == FailureMode::Open;
                error!(
                    client_id = %client_id,
                    error = %e,
                    failure_mode = ?self.config.failure_mode,
                    "Rate limit check failed"
                );
                RateLimitDecision::store_unavailable(self.config.limit, allowed)
            }
        };

        if let Some(reason) = decision.deny_reason {
            warn!(client_id = %client_id, reason = %reason, "Request rejected by rate limiter");
            record_rate_limit_rejection(&reason.to_string());
        }

        decision
    }
}
