use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Opportunity;

#[derive(Debug, Clone)]
pub struct OpportunityFields {
    pub title: String,
    pub company: String,
    pub value: i64,
    pub stage: String,
    pub probability: i32,
    pub expected_close: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Opportunity>, sqlx::Error> {
    sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Opportunity>, sqlx::Error> {
    sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, fields: &OpportunityFields) -> Result<Opportunity, sqlx::Error> {
    sqlx::query_as::<_, Opportunity>(
        "INSERT INTO opportunities
             (title, company, value, stage, probability, expected_close, owner_id, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(&fields.title)
    .bind(&fields.company)
    .bind(fields.value)
    .bind(&fields.stage)
    .bind(fields.probability)
    .bind(fields.expected_close)
    .bind(fields.owner_id)
    .bind(&fields.notes)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    fields: &OpportunityFields,
) -> Result<Opportunity, sqlx::Error> {
    sqlx::query_as::<_, Opportunity>(
        "UPDATE opportunities SET
             title = $2, company = $3, value = $4, stage = $5, probability = $6,
             expected_close = $7, owner_id = $8, notes = $9, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.company)
    .bind(fields.value)
    .bind(&fields.stage)
    .bind(fields.probability)
    .bind(fields.expected_close)
    .bind(fields.owner_id)
    .bind(&fields.notes)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM opportunities WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
