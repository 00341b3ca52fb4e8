use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Report;

pub async fn create(
    pool: &PgPool,
    title: &str,
    report_type: &str,
    parameters: &serde_json::Value,
    created_by: Uuid,
) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        "INSERT INTO reports (title, report_type, parameters, created_by)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(title)
    .bind(report_type)
    .bind(parameters)
    .bind(created_by)
    .fetch_one(pool)
    .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// `pending -> processing`. Only a pending report can be claimed.
pub async fn mark_processing(pool: &PgPool, id: Uuid) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        "UPDATE reports SET status = 'processing'
         WHERE id = $1 AND status = 'pending' RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    file_path: &str,
    page_count: i32,
) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        "UPDATE reports
         SET status = 'completed', file_path = $2, page_count = $3, error = NULL,
             completed_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(file_path)
    .bind(page_count)
    .fetch_one(pool)
    .await
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        "UPDATE reports
         SET status = 'failed', file_path = NULL, page_count = NULL, error = $2,
             completed_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(error)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reports WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
