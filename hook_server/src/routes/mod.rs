//! HTTP routes — liveness probe and per-repository trigger endpoint.

pub mod filter;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use hook_pipeline::{JobQueue, Registry};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub queue: JobQueue,
}

pub fn hook_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/hooks/{name}", get(webhook_handler).post(webhook_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "pong" }))
}

async fn webhook_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    crate::metrics::trigger_received(&name);
    webhook::handle_trigger(&state, &name, &headers, &query, body).await
}
