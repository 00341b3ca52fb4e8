use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub report_type: String,
    pub status: String,
    pub parameters: serde_json::Value,
    pub file_path: Option<String>,
    pub page_count: Option<i32>,
    pub error: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn is_settled(&self) -> bool {
        self.status == "completed" || self.status == "failed"
    }
}
