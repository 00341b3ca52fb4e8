use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::{conflict_on_unique, AppError, AppJson};
use crate::models::TaskCategory;
use crate::state::SharedState;

const DEFAULT_COLOR: &str = "#6b7280";

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

fn validate(req: &CategoryRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if let Some(color) = req.color.as_deref() {
        let hex = color.strip_prefix('#').unwrap_or("");
        if !matches!(hex.len(), 3 | 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::Validation(format!("Invalid color '{color}'")));
        }
    }
    Ok(())
}

pub async fn list(State(state): State<SharedState>) -> Result<Json<Vec<TaskCategory>>, AppError> {
    Ok(Json(db::task_categories::list(&state.pool).await?))
}

pub async fn create(
    State(state): State<SharedState>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<(StatusCode, Json<TaskCategory>), AppError> {
    validate(&req)?;

    let category = db::task_categories::create(
        &state.pool,
        req.name.trim(),
        req.color.as_deref().unwrap_or(DEFAULT_COLOR),
        req.description.as_deref(),
    )
    .await
    .map_err(|e| conflict_on_unique(e, "A category with this name already exists"))?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<Json<TaskCategory>, AppError> {
    validate(&req)?;

    let category = db::task_categories::update(
        &state.pool,
        id,
        req.name.trim(),
        req.color.as_deref().unwrap_or(DEFAULT_COLOR),
        req.description.as_deref(),
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => AppError::NotFound("Category not found".to_string()),
        other => conflict_on_unique(other, "A category with this name already exists"),
    })?;

    Ok(Json(category))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::task_categories::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
