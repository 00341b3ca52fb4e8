use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::{AppError, AppJson};
use crate::models::Report;
use crate::reports::lifecycle;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ReportType {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReport {
    pub report_type: String,
    pub title: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

async fn load(state: &SharedState, id: Uuid) -> Result<Report, AppError> {
    db::reports::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))
}

pub async fn list_types(State(state): State<SharedState>) -> Json<Vec<ReportType>> {
    Json(
        state
            .reports
            .list()
            .into_iter()
            .map(|g| ReportType {
                id: g.id().to_string(),
                name: g.name().to_string(),
                description: g.description().to_string(),
            })
            .collect(),
    )
}

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<Report>>, AppError> {
    let reports = db::reports::list_all(&state.pool)
        .await?
        .into_iter()
        .filter(|r| filter.status.as_deref().is_none_or(|s| r.status == s))
        .collect();
    Ok(Json(reports))
}

/// Queue a report. The record comes back `pending`; poll it for the outcome.
pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateReport>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let report = lifecycle::create(
        &state,
        auth.user_id,
        req.report_type.trim(),
        req.title.as_deref(),
        req.parameters,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(report)))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, AppError> {
    Ok(Json(load(&state, id).await?))
}

pub async fn content(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = load(&state, id).await?;

    let Some(path) = report.file_path.as_deref().filter(|_| report.status == "completed") else {
        return Err(AppError::NotFound(format!(
            "Report content is not available (status: {})",
            report.status
        )));
    };

    let content = state
        .report_store
        .get(path)
        .await
        .map_err(AppError::Internal)?;

    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        content,
    ))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let report = load(&state, id).await?;

    if let Some(path) = report.file_path.as_deref() {
        if let Err(e) = state.report_store.delete(path).await {
            tracing::warn!(report_id = %report.id, "Failed to remove report file: {e}");
        }
    }

    db::reports::delete(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
