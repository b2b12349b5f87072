//! Metrics configuration

use serde::Deserialize;

/// Prometheus exporter settings
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Route serving the scrape endpoint
    #[serde(default = "default_metrics_path")]
    pub path: String,
    /// Histogram buckets (seconds) for every `*_duration_seconds` metric
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,
}

fn default_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_latency_buckets() -> Vec<f64> {
    vec![0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_metrics_path(),
            latency_buckets: default_latency_buckets(),
        }
    }
}
