use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::AppError;
use crate::models::AuditLogEntry;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Newest first, one page at a time. Pages start at 1.
pub async fn list(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<AuditPage>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = state.config.audit_page_size;

    let entries = db::audit::list(&state.pool, page_size, (page - 1).saturating_mul(page_size)).await?;
    let total = db::audit::count(&state.pool).await?;

    Ok(Json(AuditPage {
        entries,
        page,
        page_size,
        total,
    }))
}
