//! Retrying transport with exponential backoff

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::gateway::{UpstreamRequest, UpstreamResponse, UpstreamTransport};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_upstream_request, record_upstream_retry};

/// Retry policy for upstream forwarding
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait after the first failed attempt; doubles each time
    pub backoff_base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Wait after failed attempt `attempt` (0-indexed): `2^attempt * base`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

/// Transport decorator that retries 429, 5xx and transport failures
///
/// The request body is already buffered, so every attempt sends the same
/// bytes. After the last attempt the final response or error is returned
/// as-is.
#[derive(Clone)]
pub struct RetryingTransport {
    inner: Arc<dyn UpstreamTransport>,
    config: RetryConfig,
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn UpstreamTransport>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Forward a request, retrying per the policy
    pub async fn forward(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, DomainError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            let result = self.inner.send(request).await;

            let retry_reason = match &result {
                Ok(response) if response.is_retryable() => {
                    Some(format!("status_{}", response.status.as_u16()))
                }
                Ok(_) => None,
                Err(_) => Some("transport".to_string()),
            };

            let Some(reason) = retry_reason else {
                record_upstream_request("success", attempt + 1, started.elapsed());
                return result;
            };

            if attempt >= self.config.max_retries {
                warn!(
                    uri = %request.uri,
                    attempts = attempt + 1,
                    reason = %reason,
                    "Upstream retries exhausted"
                );
                record_upstream_request("exhausted", attempt + 1, started.elapsed());
                return result;
            }

            let delay = self.config.backoff(attempt);

            match &result {
                Ok(response) => warn!(
                    uri = %request.uri,
                    attempt = attempt + 1,
                    status = response.status.as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "Retryable upstream status, backing off"
                ),
                Err(e) => warn!(
                    uri = %request.uri,
                    attempt = attempt + 1,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream transport error, backing off"
                ),
            }

            record_upstream_retry(&reason);
            tokio::time::sleep(delay).await;
            attempt += 1;

            debug!(uri = %request.uri, attempt = attempt + 1, "Retrying upstream request");
        }
    }
}

#[async_trait]
impl UpstreamTransport for RetryingTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, DomainError> {
        self.forward(request).await
    }
}
