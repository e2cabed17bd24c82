//! Trigger handler — resolves the repository, checks its filters, enqueues a job.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

use super::filter;
use super::AppState;

/// Handle a trigger for `name`. The reply only acknowledges the enqueue;
/// the build itself runs later on the worker.
pub async fn handle_trigger(
    state: &AppState,
    name: &str,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    body: Bytes,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    let Some(repo) = state.registry.get(name) else {
        tracing::warn!(repository = name, "Trigger for unknown repository");
        crate::metrics::trigger_rejected("unknown_repository");
        return Err((
            StatusCode::NOT_FOUND,
            format!("repository [{name}] does not exist"),
        ));
    };

    if let Err(mismatch) = filter::evaluate(&repo.hook_filters, headers, query, &body) {
        tracing::warn!(repository = name, "Trigger rejected: {mismatch}");
        crate::metrics::trigger_rejected("filter");
        return Err((StatusCode::FORBIDDEN, format!("filter rejected: {mismatch}")));
    }

    if let Err(e) = state.queue.enqueue(name).await {
        tracing::error!(repository = name, "Failed to enqueue job: {e}");
        crate::metrics::trigger_rejected("queue_closed");
        return Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()));
    }

    tracing::info!(repository = name, "Job queued");
    Ok((StatusCode::OK, format!("hook {name} success")))
}
