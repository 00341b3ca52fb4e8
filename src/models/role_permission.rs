use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::access::PermissionActions;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RolePermission {
    pub id: Uuid,
    pub role: String,
    pub resource: String,
    pub actions: Json<PermissionActions>,
    pub updated_at: DateTime<Utc>,
}
