//! Two-tier access control: a fixed role hierarchy for coarse checks and a
//! per-(role, resource) permission matrix for CRUD checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;

/// Resources guarded by the permission matrix.
pub const RESOURCES: &[&str] = &["tasks", "opportunities", "emails", "reports", "docs", "github"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Mod,
    Gc,
    ViewOnly,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Mod, Role::Gc, Role::ViewOnly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Mod => "mod",
            Role::Gc => "gc",
            Role::ViewOnly => "view_only",
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Role::Admin => 4,
            Role::Mod => 3,
            Role::Gc => 2,
            Role::ViewOnly => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "mod" => Ok(Role::Mod),
            "gc" => Ok(Role::Gc),
            "view_only" => Ok(Role::ViewOnly),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Hierarchy level of a stored role string. Unknown roles rank below everything.
pub fn role_level(role: &str) -> u8 {
    role.parse::<Role>().map(|r| r.level()).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionActions {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

impl PermissionActions {
    pub fn all() -> Self {
        Self {
            create: true,
            read: true,
            update: true,
            delete: true,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(msg) => Err(AppError::Forbidden(msg)),
        }
    }
}

/// Role threshold check: allowed iff the user's level is at least the required level.
pub fn check_role(user_role: &str, required: Role) -> Result<(), AppError> {
    if role_level(user_role) >= required.level() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Requires {required} role or higher"
        )))
    }
}

/// Decide a resource action against an optional permission row. `admin` never
/// consults the row.
pub fn evaluate(
    role: &str,
    resource: &str,
    action: Action,
    row: Option<&PermissionActions>,
) -> Decision {
    if role == Role::Admin.as_str() {
        return Decision::Allow;
    }

    match row {
        None => Decision::Deny("access denied".to_string()),
        Some(actions) if actions.allows(action) => Decision::Allow,
        Some(_) => Decision::Deny(format!("Permission denied: cannot {action} {resource}")),
    }
}

/// Resource action check backed by the `role_permissions` table.
pub async fn check_permission(
    pool: &PgPool,
    user: &AuthUser,
    resource: &str,
    action: Action,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    let row = db::role_permissions::find(pool, &user.role, resource).await?;
    evaluate(&user.role, resource, action, row.as_ref().map(|r| &r.actions.0)).into_result()
}
