use sqlx::types::Json;
use sqlx::PgPool;

use crate::access::PermissionActions;
use crate::models::RolePermission;

/// Point read of the permission row for a (role, resource) pair.
pub async fn find(
    pool: &PgPool,
    role: &str,
    resource: &str,
) -> Result<Option<RolePermission>, sqlx::Error> {
    sqlx::query_as::<_, RolePermission>(
        "SELECT * FROM role_permissions WHERE role = $1 AND resource = $2",
    )
    .bind(role)
    .bind(resource)
    .fetch_optional(pool)
    .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<RolePermission>, sqlx::Error> {
    sqlx::query_as::<_, RolePermission>(
        "SELECT * FROM role_permissions ORDER BY role, resource",
    )
    .fetch_all(pool)
    .await
}

pub async fn upsert(
    pool: &PgPool,
    role: &str,
    resource: &str,
    actions: &PermissionActions,
) -> Result<RolePermission, sqlx::Error> {
    sqlx::query_as::<_, RolePermission>(
        "INSERT INTO role_permissions (role, resource, actions)
         VALUES ($1, $2, $3)
         ON CONFLICT (role, resource)
         DO UPDATE SET actions = EXCLUDED.actions, updated_at = now()
         RETURNING *",
    )
    .bind(role)
    .bind(resource)
    .bind(Json(actions))
    .fetch_one(pool)
    .await
}
