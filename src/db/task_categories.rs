use sqlx::PgPool;
use uuid::Uuid;

use crate::models::TaskCategory;

pub async fn list(pool: &PgPool) -> Result<Vec<TaskCategory>, sqlx::Error> {
    sqlx::query_as::<_, TaskCategory>("SELECT * FROM task_categories ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    color: &str,
    description: Option<&str>,
) -> Result<TaskCategory, sqlx::Error> {
    sqlx::query_as::<_, TaskCategory>(
        "INSERT INTO task_categories (name, color, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(name)
    .bind(color)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    color: &str,
    description: Option<&str>,
) -> Result<TaskCategory, sqlx::Error> {
    sqlx::query_as::<_, TaskCategory>(
        "UPDATE task_categories SET name = $2, color = $3, description = $4
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .bind(color)
    .bind(description)
    .fetch_one(pool)
    .await
}

/// Returns false when no row matched.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM task_categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
