//! Application state for shared services

use std::sync::Arc;

use crate::domain::store::KeyValueStore;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::services::GatewayService;

/// Shared handles passed to handlers and middleware
#[derive(Debug, Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub store: Arc<dyn KeyValueStore>,
}

impl AppState {
    pub fn new(
        gateway: Arc<GatewayService>,
        rate_limiter: Arc<RateLimiter>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            gateway,
            rate_limiter,
            store,
        }
    }
}
