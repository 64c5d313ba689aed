use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AddRepoRequest, Repo, StrategyReport};
use crate::state::AppState;

/// GET /api/repos - List registered repositories
pub async fn list_repos(State(state): State<AppState>) -> Json<Vec<Repo>> {
    Json(state.repos.list())
}

/// POST /api/repos - Register a local checkout
pub async fn add_repo(
    State(state): State<AppState>,
    Json(req): Json<AddRepoRequest>,
) -> Result<(StatusCode, Json<Repo>), (StatusCode, String)> {
    let repo = state.repos.add(req)?;
    Ok((StatusCode::CREATED, Json(repo)))
}

/// GET /api/repos/{id}/reports - Latest report per strategy
pub async fn list_reports(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StrategyReport>>, (StatusCode, String)> {
    if state.repos.get(id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Repo not found".to_string()));
    }
    Ok(Json(state.reports.list(id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteReportsResponse {
    pub embeddings_deleted: usize,
    pub reports_deleted: usize,
}

/// DELETE /api/repos/{id}/reports - Drop the repository's embeddings, then its reports
pub async fn delete_reports(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteReportsResponse>, (StatusCode, String)> {
    if state.repos.get(id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Repo not found".to_string()));
    }

    let embeddings_deleted = state.vectors.delete_repo(id).await?;
    let reports_deleted = state.reports.delete_repo(id).await?;
    tracing::info!(repo_id = %id, embeddings_deleted, reports_deleted, "Repository results deleted");

    Ok(Json(DeleteReportsResponse {
        embeddings_deleted,
        reports_deleted,
    }))
}
