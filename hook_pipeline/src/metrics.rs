//! Pipeline metrics. The exporter is installed by the binary.

use metrics::{counter, histogram};

/// Record a finished job by outcome (`success` / `failure`).
pub fn job_finished(repository: &str, status: &str) {
    counter!(
        "hook_jobs_total",
        "repository" => repository.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record job duration.
pub fn job_duration(duration_ms: u64) {
    histogram!("hook_job_duration_ms").record(duration_ms as f64);
}

/// Record step duration.
pub fn step_duration(kind: &str, duration_ms: u64) {
    histogram!("hook_step_duration_ms", "kind" => kind.to_string()).record(duration_ms as f64);
}

/// Record a rollback attempt.
pub fn rollback(ok: bool) {
    counter!("hook_rollbacks_total", "ok" => ok.to_string()).increment(1);
}

/// Record a failed notification delivery.
pub fn notification_failed(kind: &str) {
    counter!("hook_notification_errors_total", "kind" => kind.to_string()).increment(1);
}

/// Record jobs waiting in the queue.
pub fn queue_depth(depth: usize) {
    metrics::gauge!("hook_queue_depth").set(depth as f64);
}
