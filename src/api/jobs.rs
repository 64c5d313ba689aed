use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream, StreamExt};
use uuid::Uuid;

use super::json_event;
use crate::jobs::Subscription;
use crate::models::Job;
use crate::state::AppState;

/// GET /api/jobs/{id} - Current job snapshot
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, (StatusCode, String)> {
    Ok(Json(state.tracker.get_job(id)?))
}

/// GET /api/jobs/{id}/stream - Live job snapshots over SSE.
///
/// Sends the current snapshot first, then one event per update named after
/// the job status. Ends after the terminal event or when no event arrives
/// within the idle timeout.
pub async fn stream_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    // Subscribe before reading the snapshot so no update falls in between.
    let subscription = state.tracker.subscribe(id)?;
    let initial = state.tracker.get_job(id)?;
    tracing::debug!(
        job_id = %id,
        subscribers = state.tracker.subscriber_count(id),
        status = ?initial.status,
        "Job stream opened"
    );
    let idle = state.config.analysis.stream_idle_timeout;

    Ok(Sse::new(job_event_stream(initial, subscription, idle)).keep_alive(KeepAlive::default()))
}

fn job_event(job: &Job) -> Event {
    json_event(job.status.event_name(), job)
}

/// Initial snapshot followed by subscription updates until terminal or idle.
pub(crate) fn job_event_stream(
    initial: Job,
    subscription: Subscription,
    idle: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let done = initial.status.is_terminal();
    let first = stream::once(async move { Ok(job_event(&initial)) });

    let updates = stream::unfold(
        (subscription, idle, done),
        |(mut subscription, idle, done)| async move {
            if done {
                return None;
            }
            match tokio::time::timeout(idle, subscription.recv()).await {
                Ok(Some(job)) => {
                    let terminal = job.status.is_terminal();
                    Some((Ok(job_event(&job)), (subscription, idle, terminal)))
                }
                Ok(None) => None,
                Err(_) => {
                    tracing::info!(job_id = %subscription.job_id(), "Job stream idle, closing");
                    let event = json_event(
                        "timeout",
                        &serde_json::json!({ "message": "no job update within the idle timeout" }),
                    );
                    Some((Ok(event), (subscription, idle, true)))
                }
            }
        },
    );

    first.chain(updates)
}
