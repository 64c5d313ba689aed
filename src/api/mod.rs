//! Axum handlers. Errors leave as `(StatusCode, String)`.

pub mod analysis;
pub mod jobs;
pub mod rag;
pub mod repos;

use axum::response::sse::Event;
use axum::Json;
use serde::Serialize;

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Named SSE event with a JSON payload.
pub(crate) fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| {
            tracing::warn!(event = name, error = %e, "SSE payload not serializable");
            Event::default().event(name).data("{}")
        })
}
