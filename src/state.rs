use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::watch;

use crate::config::Config;
use crate::email::templates::TemplateRegistry;
use crate::email::EmailTransport;
use crate::github::GithubClient;
use crate::rate_limit::LoginRateLimiter;
use crate::reports::store::ReportStore;
use crate::reports::ReportRegistry;
use crate::worker::TaskQueue;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub reports: ReportRegistry,
    pub report_store: Arc<dyn ReportStore>,
    pub templates: TemplateRegistry,
    pub mailer: Arc<dyn EmailTransport>,
    pub github: GithubClient,
    pub tasks: TaskQueue,
    pub login_limiter: LoginRateLimiter,
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Ask background workers to stop after their current job.
    pub fn begin_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
