use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Email {
    pub id: Uuid,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub template_id: Option<String>,
    pub status: String,
    pub sent_by: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
