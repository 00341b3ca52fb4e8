pub mod access;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod github;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod reports;
pub mod routes;
pub mod state;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::email::templates::TemplateRegistry;
use crate::email::{EmailTransport, SimulatedTransport, SmtpTransport};
use crate::github::GithubClient;
use crate::rate_limit::LoginRateLimiter;
use crate::reports::store::LocalReportStore;
use crate::reports::ReportRegistry;
use crate::state::{AppState, SharedState};
use crate::worker::TaskQueue;

/// Build the router and the shared state. Must be called inside a Tokio runtime
/// since it starts the background workers.
pub fn build_app(pool: PgPool, config: Config) -> Result<(Router, SharedState), String> {
    let mailer: Arc<dyn EmailTransport> = match config.smtp.as_ref().map(SmtpTransport::new) {
        Some(Ok(transport)) => {
            tracing::info!("SMTP transport configured");
            Arc::new(transport)
        }
        Some(Err(e)) => {
            tracing::warn!("SMTP not available, simulating delivery: {e}");
            Arc::new(SimulatedTransport::new(config.email.clone()))
        }
        None => {
            tracing::info!("No SMTP configured, simulating email delivery");
            Arc::new(SimulatedTransport::new(config.email.clone()))
        }
    };

    let github = GithubClient::new(&config.github)?;
    if config.github.token.is_none() {
        tracing::info!("GITHUB_TOKEN not set, repository sync disabled");
    }

    if config.dev_auth {
        tracing::warn!("Development auth enabled: x-user-id header is trusted");
    }

    let (shutdown, shutdown_rx) = watch::channel(false);
    let (tasks, _workers) = TaskQueue::start(config.worker_count, shutdown_rx.clone());

    let state: SharedState = Arc::new(AppState {
        pool,
        report_store: Arc::new(LocalReportStore::new(config.report_dir.clone())),
        config,
        reports: ReportRegistry::builtin(),
        templates: TemplateRegistry::builtin(),
        mailer,
        github,
        tasks,
        login_limiter: LoginRateLimiter::new(),
        shutdown,
    });

    spawn_limiter_cleanup(state.clone(), shutdown_rx);

    let max_body_size = state.config.max_body_size;

    let app = Router::new()
        .merge(routes::api_routes(&state))
        .route("/health", axum::routing::get(health))
        .layer(
            // CorsLayer needs a Default response body, so it sits inside the body limit
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(max_body_size))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                )),
        )
        .with_state(state.clone());

    Ok((app, state))
}

fn spawn_limiter_cleanup(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = interval.tick() => state.login_limiter.cleanup(),
                _ = shutdown.changed() => break,
            }
        }
    });
}

async fn health() -> &'static str {
    "ok"
}
