use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Role;
use crate::auth::extractor::AuthUser;
use crate::auth::password;
use crate::db;
use crate::email::dispatcher::looks_like_email;
use crate::error::{conflict_on_unique, AppError, AppJson};
use crate::models::User;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub role: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

fn parse_role(role: &str) -> Result<Role, AppError> {
    role.parse::<Role>().map_err(AppError::Validation)
}

async fn load(state: &SharedState, id: Uuid) -> Result<User, AppError> {
    db::users::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn list(State(state): State<SharedState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(db::users::list_all(&state.pool).await?))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(load(&state, id).await?))
}

pub async fn create(
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let email = req.email.trim();
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if !looks_like_email(email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    password::validate(&req.password)?;
    let role = parse_role(&req.role)?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    let user = db::users::create(&state.pool, email, &pw_hash, name, role.as_str())
        .await
        .map_err(|e| conflict_on_unique(e, "A user with this email already exists"))?;

    tracing::info!(user_id = %user.id, role = %role, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateUser>,
) -> Result<Json<User>, AppError> {
    let existing = load(&state, id).await?;

    let name = req.name.map(|n| n.trim().to_string()).unwrap_or(existing.name);
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    let role = match req.role.as_deref() {
        Some(role) => parse_role(role)?,
        None => parse_role(&existing.role)?,
    };
    if id == auth.user_id && role != Role::Admin {
        return Err(AppError::Validation(
            "You cannot remove your own admin role".to_string(),
        ));
    }

    let permissions = req.permissions.unwrap_or(existing.permissions);
    if !permissions.is_object() {
        return Err(AppError::Validation(
            "permissions must be a JSON object".to_string(),
        ));
    }

    let user = db::users::update(&state.pool, id, &name, role.as_str(), &permissions).await?;
    Ok(Json(user))
}

/// Flip the active flag. Deactivated users can no longer authenticate.
pub async fn toggle_active(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    if id == auth.user_id {
        return Err(AppError::Validation(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    load(&state, id).await?;

    let user = db::users::toggle_active(&state.pool, id).await?;
    tracing::info!(user_id = %user.id, is_active = user.is_active, "User active flag changed");
    Ok(Json(user))
}
