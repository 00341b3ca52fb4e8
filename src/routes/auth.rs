use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::access::Role;
use crate::auth::extractor::AuthUser;
use crate::auth::jwt::{encode_token, Claims, TOKEN_TTL_HOURS};
use crate::auth::password;
use crate::db;
use crate::error::{AppError, AppJson};
use crate::models::User;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn auth_cookie(access_token: &str) -> CookieJar {
    let access = Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(TOKEN_TTL_HOURS))
        .build();

    CookieJar::new().add(access)
}

fn clear_auth_cookie() -> CookieJar {
    let access = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    CookieJar::new().add(access)
}

fn issue_token(state: &SharedState, user: &User) -> Result<String, AppError> {
    let claims = Claims::new(user.id, user.role.clone());
    encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)
}

/// Create the first account as `admin`. Closed once any user exists; later
/// accounts are created by an admin through `/api/users`.
pub async fn register(
    State(state): State<SharedState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = req.email.trim();
    let name = req.name.trim();
    if email.is_empty() || req.password.is_empty() || name.is_empty() {
        return Err(AppError::Validation("All fields are required".to_string()));
    }
    if !crate::email::dispatcher::looks_like_email(email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    password::validate(&req.password)?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    // Advisory lock prevents concurrent bootstrap registrations
    let mut tx = state.pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(1)")
        .execute(&mut *tx)
        .await?;

    let count = db::users::count_all(&mut *tx).await?;
    if count > 0 {
        return Err(AppError::Forbidden(
            "Registration is disabled. Contact your administrator.".to_string(),
        ));
    }

    let user = db::users::create(&mut *tx, email, &pw_hash, name, Role::Admin.as_str()).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "Bootstrap admin registered");

    let access_token = issue_token(&state, &user)?;
    Ok((auth_cookie(&access_token), Json(AuthResponse { access_token, user })))
}

pub async fn login(
    State(state): State<SharedState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    if let Err(retry_after) = state.login_limiter.check(&req.email) {
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Try again in {retry_after} seconds."
        )));
    }

    let Some(user) = db::users::find_by_email(&state.pool, req.email.trim()).await? else {
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthenticated("Invalid credentials".to_string()));
    };

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthenticated("Invalid credentials".to_string()));
    }

    if !user.is_active {
        return Err(AppError::Unauthenticated("Account is deactivated".to_string()));
    }

    state.login_limiter.clear(&req.email);

    let access_token = issue_token(&state, &user)?;
    Ok((auth_cookie(&access_token), Json(AuthResponse { access_token, user })))
}

pub async fn logout() -> (CookieJar, Json<MessageResponse>) {
    (
        clear_auth_cookie(),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

pub async fn me(auth: AuthUser, State(state): State<SharedState>) -> Result<Json<User>, AppError> {
    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Unknown user".to_string()))?;
    Ok(Json(user))
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    password::validate(&req.new_password)?;

    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Unknown user".to_string()))?;

    let valid = password::verify(&req.current_password, &user.password_hash)
        .map_err(AppError::Internal)?;
    if !valid {
        return Err(AppError::Unauthenticated(
            "Current password is incorrect".to_string(),
        ));
    }

    let pw_hash = password::hash(&req.new_password).map_err(AppError::Internal)?;
    db::users::update_password(&state.pool, user.id, &pw_hash).await?;

    Ok(Json(MessageResponse {
        message: "Password changed".to_string(),
    }))
}
