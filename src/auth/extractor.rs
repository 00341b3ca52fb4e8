use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::access::{self, Role};
use crate::auth::jwt;
use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::state::SharedState;

/// Development-only identity header, honoured when `WISHDESK_DEV_AUTH` is set.
pub const DEV_USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }

    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        access::check_role(&self.role, required)
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by the request pipeline
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let user_id = resolve_user_id(parts, state)?;

        let user = db::users::find_by_id(&state.pool, user_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Unknown user".to_string()))?;

        if !user.is_active {
            return Err(AppError::Unauthenticated(
                "Account is deactivated".to_string(),
            ));
        }

        Ok(AuthUser::from(user))
    }
}

fn resolve_user_id(parts: &Parts, state: &SharedState) -> Result<Uuid, AppError> {
    // Bearer token from Authorization header first
    if let Some(auth_header) = parts.headers.get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthenticated("Invalid authorization header".to_string()))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            let claims = jwt::decode_token(token, &state.config.jwt_secret)
                .map_err(|_| AppError::Unauthenticated("Invalid or expired token".to_string()))?;
            return Ok(claims.sub);
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get("access_token") {
        let claims = jwt::decode_token(cookie.value(), &state.config.jwt_secret)
            .map_err(|_| AppError::Unauthenticated("Invalid or expired token".to_string()))?;
        return Ok(claims.sub);
    }

    if state.config.dev_auth {
        if let Some(value) = parts.headers.get(DEV_USER_HEADER) {
            return value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<Uuid>().ok())
                .ok_or_else(|| AppError::Unauthenticated("Invalid x-user-id header".to_string()));
        }
    }

    Err(AppError::Unauthenticated(
        "Missing authentication".to_string(),
    ))
}
