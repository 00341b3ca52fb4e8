use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Task;

/// Column values shared by insert and full update.
#[derive(Debug, Clone)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub category_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub opportunity_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    fields: &TaskFields,
    created_by: Uuid,
) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "INSERT INTO tasks
             (title, description, status, priority, category_id, assigned_to, created_by,
              company_id, opportunity_id, due_date, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                 CASE WHEN $3 = 'done' THEN now() ELSE NULL END)
         RETURNING *",
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.status)
    .bind(&fields.priority)
    .bind(fields.category_id)
    .bind(fields.assigned_to)
    .bind(created_by)
    .bind(fields.company_id)
    .bind(fields.opportunity_id)
    .bind(fields.due_date)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, fields: &TaskFields) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "UPDATE tasks SET
             title = $2, description = $3, status = $4, priority = $5, category_id = $6,
             assigned_to = $7, company_id = $8, opportunity_id = $9, due_date = $10,
             completed_at = CASE
                 WHEN $4 = 'done' THEN COALESCE(completed_at, now())
                 ELSE NULL
             END,
             updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.status)
    .bind(&fields.priority)
    .bind(fields.category_id)
    .bind(fields.assigned_to)
    .bind(fields.company_id)
    .bind(fields.opportunity_id)
    .bind(fields.due_date)
    .fetch_one(pool)
    .await
}

pub async fn set_status(pool: &PgPool, id: Uuid, status: &str) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "UPDATE tasks SET
             status = $2,
             completed_at = CASE
                 WHEN $2 = 'done' THEN COALESCE(completed_at, now())
                 ELSE NULL
             END,
             updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
