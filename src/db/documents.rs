use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Document;

pub async fn list_all(pool: &PgPool) -> Result<Vec<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY updated_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    title: &str,
    category: &str,
    content: &str,
    author_id: Uuid,
) -> Result<Document, sqlx::Error> {
    sqlx::query_as::<_, Document>(
        "INSERT INTO documents (title, category, content, author_id)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(title)
    .bind(category)
    .bind(content)
    .bind(author_id)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    title: &str,
    category: &str,
    content: &str,
) -> Result<Document, sqlx::Error> {
    sqlx::query_as::<_, Document>(
        "UPDATE documents SET title = $2, category = $3, content = $4, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(title)
    .bind(category)
    .bind(content)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
