use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::email::dispatcher::{self, SendEmailRequest};
use crate::email::templates::EmailTemplate;
use crate::error::{AppError, AppJson};
use crate::models::Email;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct EmailFilter {
    pub status: Option<String>,
}

pub async fn list_templates(State(state): State<SharedState>) -> Json<Vec<EmailTemplate>> {
    Json(state.templates.list().to_vec())
}

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<EmailFilter>,
) -> Result<Json<Vec<Email>>, AppError> {
    let emails = db::emails::list_all(&state.pool)
        .await?
        .into_iter()
        .filter(|e| filter.status.as_deref().is_none_or(|s| e.status == s))
        .collect();
    Ok(Json(emails))
}

/// Store the message as `pending` and hand it to the background dispatcher.
pub async fn send(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<SendEmailRequest>,
) -> Result<(StatusCode, Json<Email>), AppError> {
    let email = dispatcher::send_email(&state, auth.user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(email)))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Email>, AppError> {
    db::emails::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::emails::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Email not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
