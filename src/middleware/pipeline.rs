//! Explicit per-route request pipeline: authenticate, run guards in order, call
//! the handler, then run the audit stage.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use sqlx::PgPool;

use crate::access::{self, Action, Role};
use crate::audit::{self, AuditCapture, AuditLabel};
use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    RequireRole(Role),
    RequirePermission(&'static str, Action),
}

/// Outcome of a single guard.
#[derive(Debug)]
pub enum Verdict {
    /// Run the next guard.
    Continue,
    /// Skip the remaining guards and run the handler.
    Allow,
    /// Stop here with this error response.
    Deny(AppError),
}

impl Guard {
    pub async fn evaluate(&self, pool: &PgPool, user: &AuthUser) -> Verdict {
        match self {
            Guard::RequireRole(required) => match user.require_role(*required) {
                Ok(()) => Verdict::Continue,
                Err(e) => Verdict::Deny(e),
            },
            Guard::RequirePermission(resource, action) => {
                if user.is_admin() {
                    return Verdict::Allow;
                }

                match access::check_permission(pool, user, resource, *action).await {
                    Ok(()) => Verdict::Continue,
                    Err(e) => Verdict::Deny(e),
                }
            }
        }
    }
}

/// Ordered stages for one method route. Authentication is always the first stage.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    guards: Vec<Guard>,
    audit: Option<AuditLabel>,
}

impl Pipeline {
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.guards.push(Guard::RequireRole(role));
        self
    }

    pub fn require_permission(mut self, resource: &'static str, action: Action) -> Self {
        self.guards.push(Guard::RequirePermission(resource, action));
        self
    }

    pub fn audited(mut self, action: &'static str, resource: &'static str) -> Self {
        self.audit = Some(AuditLabel { action, resource });
        self
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn audit_label(&self) -> Option<AuditLabel> {
        self.audit
    }
}

#[derive(Clone)]
pub struct Stage {
    state: SharedState,
    pipeline: Arc<Pipeline>,
}

/// Wrap a method route with `pipeline`.
pub fn attach(
    state: &SharedState,
    pipeline: Pipeline,
    route: MethodRouter<SharedState>,
) -> MethodRouter<SharedState> {
    let stage = Stage {
        state: state.clone(),
        pipeline: Arc::new(pipeline),
    };
    route.route_layer(axum::middleware::from_fn_with_state(stage, run))
}

pub async fn run(State(stage): State<Stage>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let user = match AuthUser::from_request_parts(&mut parts, &stage.state).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    for guard in stage.pipeline.guards() {
        match guard.evaluate(&stage.state.pool, &user).await {
            Verdict::Continue => {}
            Verdict::Allow => break,
            Verdict::Deny(err) => {
                tracing::debug!(user_id = %user.user_id, ?guard, "Request denied: {err}");
                return err.into_response();
            }
        }
    }

    parts.extensions.insert(user.clone());

    let Some(label) = stage.pipeline.audit_label() else {
        return next.run(Request::from_parts(parts, body)).await;
    };

    let bytes = match axum::body::to_bytes(body, stage.state.config.max_body_size).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Validation("Request body too large or unreadable".to_string())
                .into_response();
        }
    };

    let resource_id = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == "id")
                .map(|(_, value)| value.to_string())
        });

    let peer_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    let capture = AuditCapture::new(
        parts.method.clone(),
        &parts.headers,
        resource_id,
        &bytes,
        peer_addr,
        &stage.state.config.trusted_proxies,
    );

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    if audit::should_record(response.status(), Some(&user)) {
        let record = capture.into_record(&user, label);
        let pool = stage.state.pool.clone();
        stage
            .state
            .tasks
            .submit("audit", async move { audit::record(&pool, record).await });
    }

    response
}
