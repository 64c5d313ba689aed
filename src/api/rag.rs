use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;

use super::json_event;
use crate::error::Result as AnalyzerResult;
use crate::models::{RagQueryRequest, RagQueryResponse};
use crate::state::AppState;

/// POST /api/rag/query - Answer a question from the repository's indexed code
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<RagQueryRequest>,
) -> Result<Json<RagQueryResponse>, (StatusCode, String)> {
    Ok(Json(state.rag.query(req.repo_id, &req.question).await?))
}

/// POST /api/rag/stream - Same as `query`, streamed as `sources`, `delta`*, then `done` or `error`
pub async fn stream(
    State(state): State<AppState>,
    Json(req): Json<RagQueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let rag_stream = state.rag.query_stream(req.repo_id, &req.question).await?;
    let idle = state.config.analysis.stream_idle_timeout;

    let sources_event = json_event("sources", &serde_json::json!({ "sources": rag_stream.sources }));

    Ok(Sse::new(
        stream::once(async move { Ok(sources_event) }).chain(fragment_events(rag_stream.fragments, idle)),
    ))
}

enum Phase {
    Streaming,
    Finished,
}

/// Fragments as `delta` events, closed by `done`; an error or idle timeout ends with `error`.
fn fragment_events(
    fragments: mpsc::Receiver<AnalyzerResult<String>>,
    idle: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (fragments, Phase::Streaming),
        move |(mut fragments, phase)| async move {
            if let Phase::Finished = phase {
                return None;
            }
            let event = match tokio::time::timeout(idle, fragments.recv()).await {
                Ok(Some(Ok(content))) => {
                    let event = json_event("delta", &serde_json::json!({ "content": content }));
                    return Some((Ok(event), (fragments, Phase::Streaming)));
                }
                Ok(Some(Err(e))) => json_event("error", &serde_json::json!({ "message": e.to_string() })),
                Ok(None) => json_event("done", &serde_json::json!({})),
                Err(_) => json_event(
                    "error",
                    &serde_json::json!({ "message": "LLM response timed out (idle)" }),
                ),
            };
            Some((Ok(event), (fragments, Phase::Finished)))
        },
    )
}
