//! Report state machine: `pending -> processing -> completed | failed`.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::{page_count, ReportError, ReportParams};
use crate::db;
use crate::error::AppError;
use crate::models::Report;
use crate::state::{AppState, SharedState};

/// Upper bound on a single generator run.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Insert a `pending` record and queue its generation. Returns immediately.
pub async fn create(
    state: &SharedState,
    created_by: Uuid,
    report_type: &str,
    title: Option<&str>,
    parameters: serde_json::Value,
) -> Result<Report, AppError> {
    let generator = state
        .reports
        .get(report_type)
        .ok_or_else(|| AppError::Validation(format!("Unknown report type: {report_type}")))?;

    ReportParams::parse(&parameters).map_err(|e| AppError::Validation(e.to_string()))?;

    let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => format!("{} ({})", generator.name(), Utc::now().format("%Y-%m-%d")),
    };

    let report = db::reports::create(&state.pool, &title, report_type, &parameters, created_by).await?;

    let worker_state = state.clone();
    let queued = report.clone();
    state.tasks.submit("report", async move {
        if let Err(e) = run_generation(&worker_state, &queued).await {
            tracing::error!(report_id = %queued.id, "Report bookkeeping failed: {e}");
        }
    });

    Ok(report)
}

/// Drive one report to a terminal state. Generator errors end in `failed`;
/// only a failure to update the record itself is returned as an error.
pub async fn run_generation(state: &AppState, report: &Report) -> Result<Report, AppError> {
    let Some(report) = db::reports::mark_processing(&state.pool, report.id).await? else {
        // Already claimed or settled
        return db::reports::find_by_id(&state.pool, report.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()));
    };

    tracing::info!(report_id = %report.id, report_type = %report.report_type, "Generating report");

    match generate_content(state, &report).await {
        Ok(content) => match store_content(state, &report, &content).await {
            Ok(path) => {
                let pages = page_count(&content);
                let completed = db::reports::mark_completed(&state.pool, report.id, &path, pages).await;
                if completed.is_err() {
                    let _ = state.report_store.delete(&path).await;
                }
                let completed = completed?;
                tracing::info!(report_id = %report.id, pages, "Report completed");
                Ok(completed)
            }
            Err(e) => fail(state, &report, e).await,
        },
        Err(e) => fail(state, &report, e).await,
    }
}

async fn generate_content(state: &AppState, report: &Report) -> Result<String, ReportError> {
    let generator = state
        .reports
        .get(&report.report_type)
        .cloned()
        .ok_or_else(|| ReportError::UnknownType(report.report_type.clone()))?;
    let params = ReportParams::parse(&report.parameters)?;
    let pool = state.pool.clone();

    // Separate task so a panicking generator still settles the record
    let handle = tokio::spawn(async move {
        tokio::time::timeout(GENERATION_TIMEOUT, generator.generate(&pool, &params)).await
    });

    match handle.await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ReportError::TimedOut),
        Err(_) => Err(ReportError::Panicked),
    }
}

async fn store_content(state: &AppState, report: &Report, content: &str) -> Result<String, ReportError> {
    state
        .report_store
        .put(&format!("{}.md", report.id), content)
        .await
        .map_err(ReportError::Storage)
}

async fn fail(state: &AppState, report: &Report, error: ReportError) -> Result<Report, AppError> {
    tracing::warn!(report_id = %report.id, "Report generation failed: {error}");
    Ok(db::reports::mark_failed(&state.pool, report.id, &error.to_string()).await?)
}
