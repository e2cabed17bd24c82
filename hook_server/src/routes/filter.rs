//! Trigger filters — header / parameter preconditions checked before enqueue.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use hook_pipeline::{FilterKind, HookFilter};

#[derive(Debug, PartialEq, Eq)]
pub struct FilterMismatch {
    pub kind: FilterKind,
    pub key: String,
}

impl std::fmt::Display for FilterMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} `{}` does not match", self.kind, self.key)
    }
}

/// Parameters carried by the request body, decoded on first use.
enum BodyParams {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Empty,
}

impl BodyParams {
    fn parse(headers: &HeaderMap, body: &[u8]) -> Self {
        if body.is_empty() {
            return BodyParams::Empty;
        }
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            return serde_urlencoded::from_bytes(body)
                .map(BodyParams::Form)
                .unwrap_or(BodyParams::Empty);
        }
        serde_json::from_slice(body)
            .map(BodyParams::Json)
            .unwrap_or(BodyParams::Empty)
    }

    fn get(&self, key: &str) -> Option<String> {
        match self {
            BodyParams::Json(value) => json_lookup(value, key),
            BodyParams::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            BodyParams::Empty => None,
        }
    }
}

/// Exact key first, then a dotted path (`repository.full_name`).
fn json_lookup(value: &serde_json::Value, key: &str) -> Option<String> {
    let found = value
        .get(key)
        .or_else(|| key.split('.').try_fold(value, |v, part| v.get(part)))?;

    match found {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Every filter must match exactly; the first mismatch rejects the trigger.
pub fn evaluate(
    filters: &[HookFilter],
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    body: &[u8],
) -> Result<(), FilterMismatch> {
    let mut body_params: Option<BodyParams> = None;

    for filter in filters {
        let actual = match filter.kind {
            FilterKind::Header => headers
                .get(filter.key.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            FilterKind::Parameter => query.get(&filter.key).cloned().or_else(|| {
                body_params
                    .get_or_insert_with(|| BodyParams::parse(headers, body))
                    .get(&filter.key)
            }),
        };

        if actual.as_deref() != Some(filter.value.as_str()) {
            return Err(FilterMismatch {
                kind: filter.kind,
                key: filter.key.clone(),
            });
        }
    }
    Ok(())
}
