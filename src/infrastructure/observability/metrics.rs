//! Prometheus metrics infrastructure

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

use super::config::MetricsConfig;
use crate::domain::CacheTier;

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static NUMERIC_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    let builder = if config.latency_buckets.is_empty() {
        Ok(PrometheusBuilder::new())
    } else {
        PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &config.latency_buckets,
        )
    };

    match builder.and_then(|builder| builder.install_recorder()) {
        Ok(handle) => {
            gauge!("ai_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, cache_hit: bool, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
        ("cache_hit", cache_hit.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record the outcome of a cache lookup (`None` is a miss)
pub fn record_cache_lookup(tier: Option<CacheTier>) {
    match tier {
        Some(tier) => counter!("cache_hits_total", "tier" => tier.to_string()).increment(1),
        None => counter!("cache_misses_total").increment(1),
    }
}

/// Record a degraded cache dependency (store or embedding failure)
pub fn record_cache_degraded(dependency: &'static str) {
    counter!("cache_degraded_total", "dependency" => dependency).increment(1);
}

/// Record a rejected request
pub fn record_rate_limit_rejection(reason: &str) {
    counter!("rate_limit_rejections_total", "reason" => reason.to_string()).increment(1);
}

/// Record a retried upstream attempt
pub fn record_upstream_retry(reason: &str) {
    counter!("upstream_retries_total", "reason" => reason.to_string()).increment(1);
}

/// Record a completed upstream forward (all attempts)
pub fn record_upstream_request(outcome: &str, attempts: u32, duration: Duration) {
    let labels = [("outcome", outcome.to_string())];

    counter!("upstream_requests_total", &labels).increment(1);
    histogram!("upstream_attempts", &labels).record(attempts as f64);
    histogram!("upstream_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a write-back job outcome (`completed`, `dropped`, ...)
pub fn record_write_back(outcome: &'static str) {
    counter!("cache_write_back_total", "outcome" => outcome).increment(1);
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, "{id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    if path.len() > 50 {
        path.chars().take(50).collect()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/v1/files/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(sanitize_path(path), "/v1/files/{id}");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        assert_eq!(sanitize_path("/v1/threads/123/runs"), "/v1/threads/{id}/runs");
    }

    #[test]
    fn test_sanitize_path_no_id() {
        assert_eq!(sanitize_path("/v1/chat/completions"), "/v1/chat/completions");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        assert!(sanitize_path(path).len() <= 50);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(Some(CacheTier::Exact));
        record_cache_lookup(None);
        record_rate_limit_rejection("limit_exceeded");
        record_upstream_retry("status_503");
        record_upstream_request("success", 2, Duration::from_millis(120));
        record_write_back("dropped");
    }
}
