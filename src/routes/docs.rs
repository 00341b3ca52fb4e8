use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::{AppError, AppJson};
use crate::models::Document;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct DocFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDoc {
    pub title: String,
    pub category: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoc {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
}

async fn load(state: &SharedState, id: Uuid) -> Result<Document, AppError> {
    db::documents::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
}

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<DocFilter>,
) -> Result<Json<Vec<Document>>, AppError> {
    let search = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let docs = db::documents::list_all(&state.pool)
        .await?
        .into_iter()
        .filter(|d| filter.category.as_deref().is_none_or(|c| d.category == c))
        .filter(|d| {
            search.as_deref().is_none_or(|term| {
                d.title.to_lowercase().contains(term) || d.content.to_lowercase().contains(term)
            })
        })
        .collect();

    Ok(Json(docs))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(load(&state, id).await?))
}

/// Raw markdown body.
pub async fn content(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let doc = load(&state, id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        doc.content,
    ))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateDoc>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let category = req
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("general");

    let doc = db::documents::create(&state.pool, title, category, &req.content, auth.user_id).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateDoc>,
) -> Result<Json<Document>, AppError> {
    let existing = load(&state, id).await?;

    let title = req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title);
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    let category = req.category.unwrap_or(existing.category);
    let content = req.content.unwrap_or(existing.content);

    let doc = db::documents::update(&state.pool, id, &title, &category, &content).await?;
    Ok(Json(doc))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::documents::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Document not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
