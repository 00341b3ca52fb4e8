use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STAGES: &[&str] = &["lead", "qualified", "proposal", "negotiation", "won", "lost"];

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    /// Deal value in minor currency units.
    pub value: i64,
    pub stage: String,
    pub probability: i32,
    pub expected_close: Option<NaiveDate>,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
