use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::access::{PermissionActions, Role, RESOURCES};
use crate::db;
use crate::error::{AppError, AppJson};
use crate::models::RolePermission;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct UpsertPermission {
    pub role: String,
    pub resource: String,
    pub actions: PermissionActions,
}

pub async fn list(State(state): State<SharedState>) -> Result<Json<Vec<RolePermission>>, AppError> {
    Ok(Json(db::role_permissions::list(&state.pool).await?))
}

/// Set the actions for one (role, resource) pair.
pub async fn upsert(
    State(state): State<SharedState>,
    AppJson(req): AppJson<UpsertPermission>,
) -> Result<Json<RolePermission>, AppError> {
    let role = req.role.parse::<Role>().map_err(AppError::Validation)?;
    if role == Role::Admin {
        return Err(AppError::Validation(
            "admin has full access and cannot be restricted".to_string(),
        ));
    }
    if !RESOURCES.contains(&req.resource.as_str()) {
        return Err(AppError::Validation(format!(
            "Unknown resource '{}'. Expected one of: {}",
            req.resource,
            RESOURCES.join(", ")
        )));
    }

    let row = db::role_permissions::upsert(&state.pool, role.as_str(), &req.resource, &req.actions).await?;
    tracing::info!(role = %role, resource = %req.resource, "Role permission updated");
    Ok(Json(row))
}
