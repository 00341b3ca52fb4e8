use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::github::sync::{self as github_sync, SyncSummary};
use crate::models::GithubRepo;
use crate::state::SharedState;

pub async fn list_repos(State(state): State<SharedState>) -> Result<Json<Vec<GithubRepo>>, AppError> {
    Ok(Json(db::github_repos::list_all(&state.pool).await?))
}

/// Pull the remote repository listing and upsert it locally.
pub async fn sync(State(state): State<SharedState>) -> Result<Json<SyncSummary>, AppError> {
    let summary = github_sync::sync(&state.pool, &state.github).await?;
    Ok(Json(summary))
}

pub async fn delete_repo(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::github_repos::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Repository not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
