use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Email;

pub struct NewEmail<'a> {
    pub to_address: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub template_id: Option<&'a str>,
    pub sent_by: Option<Uuid>,
    pub task_id: Option<Uuid>,
}

pub async fn create(pool: &PgPool, email: &NewEmail<'_>) -> Result<Email, sqlx::Error> {
    sqlx::query_as::<_, Email>(
        "INSERT INTO emails (to_address, subject, body, template_id, sent_by, task_id)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(email.to_address)
    .bind(email.subject)
    .bind(email.body)
    .bind(email.template_id)
    .bind(email.sent_by)
    .bind(email.task_id)
    .fetch_one(pool)
    .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("SELECT * FROM emails ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("SELECT * FROM emails WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE emails SET status = 'sent', sent_at = now(), error = NULL WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE emails SET status = 'failed', error = $2 WHERE id = $1")
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_opened(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE emails SET opened_at = now() WHERE id = $1 AND opened_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM emails WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
