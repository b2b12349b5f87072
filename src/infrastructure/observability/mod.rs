//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use self::config::MetricsConfig;
pub use self::metrics::{
    create_metrics_router, init_metrics, record_cache_degraded, record_cache_lookup,
    record_http_request, record_rate_limit_rejection, record_upstream_request,
    record_upstream_retry, record_write_back, PrometheusMetrics,
};
