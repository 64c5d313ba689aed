use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{RunAnalysisRequest, RunAnalysisResponse, StrategyInfo};
use crate::state::AppState;

/// GET /api/analysis/strategies - Registered strategies in run order
pub async fn list_strategies(State(state): State<AppState>) -> Json<Vec<StrategyInfo>> {
    Json(state.orchestrator.engine().infos())
}

/// POST /api/analysis/run - Start (or join) an analysis job; returns immediately
pub async fn run_analysis(
    State(state): State<AppState>,
    Json(req): Json<RunAnalysisRequest>,
) -> Result<(StatusCode, Json<RunAnalysisResponse>), (StatusCode, String)> {
    let run = state.orchestrator.start_analysis(req.repo_id).await?;

    let message = if run.reused {
        "Analysis already running for this repository".to_string()
    } else {
        "Analysis started".to_string()
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAnalysisResponse {
            job_id: run.job_id,
            strategies: state.orchestrator.engine().names(),
            message,
        }),
    ))
}
