//! Prometheus metrics for the trigger boundary.

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a trigger received for a repository.
pub fn trigger_received(repository: &str) {
    counter!("hook_triggers_total", "repository" => repository.to_string()).increment(1);
}

/// Record a trigger rejected before enqueue.
pub fn trigger_rejected(reason: &str) {
    counter!("hook_triggers_rejected_total", "reason" => reason.to_string()).increment(1);
}
