//! Upstream transport trait

use async_trait::async_trait;

use super::{UpstreamRequest, UpstreamResponse};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Sends a single request to the upstream
///
/// Transport-level failures are errors; every HTTP status, including 5xx,
/// is a successful send.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, DomainError>;
}
