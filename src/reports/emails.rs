use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{count_by, rate, Markdown, ReportError, ReportGenerator, ReportParams};
use crate::db;
use crate::models::Email;

pub struct EmailPerformanceReport;

#[async_trait]
impl ReportGenerator for EmailPerformanceReport {
    fn id(&self) -> &str {
        "email-performance"
    }

    fn name(&self) -> &str {
        "Email Performance"
    }

    fn description(&self) -> &str {
        "Delivery status, open rate and template usage for outgoing email"
    }

    async fn generate(&self, pool: &PgPool, params: &ReportParams) -> Result<String, ReportError> {
        let emails = db::emails::list_all(pool).await?;
        Ok(render_email_performance(&emails, params, Utc::now()))
    }
}

pub fn render_email_performance(
    emails: &[Email],
    params: &ReportParams,
    now: DateTime<Utc>,
) -> String {
    let emails: Vec<Email> = emails
        .iter()
        .filter(|e| params.includes(e.created_at, now))
        .cloned()
        .collect();

    let sent = emails.iter().filter(|e| e.status == "sent").count();
    let failed = emails.iter().filter(|e| e.status == "failed").count();
    let opened = emails.iter().filter(|e| e.opened_at.is_some()).count();

    let mut doc = Markdown::new("Email Performance Report", params, now);

    doc.section("Overview")
        .bullet(format!("Total emails: {}", emails.len()))
        .bullet(format!("Sent: {sent}"))
        .bullet(format!("Failed: {failed}"))
        .bullet(format!("Opened: {opened}"))
        .bullet(format!("Open rate: {:.1}%", rate(opened, sent)))
        .bullet(format!("Delivery rate: {:.1}%", rate(sent, sent + failed)));

    doc.section("By Status")
        .counts(&count_by(&emails, |e| e.status.clone()), emails.len());

    doc.section("By Template").counts(
        &count_by(&emails, |e| {
            e.template_id.clone().unwrap_or_else(|| "ad hoc".to_string())
        }),
        emails.len(),
    );

    let mut recipients = count_by(&emails, |e| e.to_address.to_lowercase());
    recipients.truncate(params.top_n);

    doc.section(&format!("Top {} Recipients", params.top_n));
    if recipients.is_empty() {
        doc.bullet("None");
    }
    for (rank, (address, count)) in recipients.iter().enumerate() {
        doc.line(format!("{}. {address} ({count} emails)", rank + 1));
    }

    doc.finish()
}
