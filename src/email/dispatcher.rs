use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::templates::TemplateRegistry;
use super::{DeliveryReceipt, EmailTransport, OutgoingEmail};
use crate::db;
use crate::error::AppError;
use crate::models::Email;
use crate::state::SharedState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub template_id: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub template_id: Option<String>,
}

/// Resolve the template (if any) and substitute variables. An explicit subject
/// or body overrides the template's and is substituted as well.
pub fn prepare(templates: &TemplateRegistry, req: &SendEmailRequest) -> Result<PreparedEmail, AppError> {
    let to = req.to.trim();
    if !looks_like_email(to) {
        return Err(AppError::Validation("A valid recipient address is required".to_string()));
    }

    let (template_subject, template_body) = match req.template_id.as_deref() {
        Some(id) => {
            let template = templates
                .get(id)
                .ok_or_else(|| AppError::Validation(format!("Unknown email template: {id}")))?;
            (Some(template.subject), Some(template.body))
        }
        None => (None, None),
    };

    let subject = req.subject.as_deref().or(template_subject).unwrap_or_default();
    let body = req.body.as_deref().or(template_body).unwrap_or_default();

    if subject.trim().is_empty() || body.trim().is_empty() {
        return Err(AppError::Validation(
            "Subject and body are required when no template is given".to_string(),
        ));
    }

    Ok(PreparedEmail {
        to: to.to_string(),
        subject: super::templates::substitute(subject, &req.variables),
        body: super::templates::substitute(body, &req.variables),
        template_id: req.template_id.clone(),
    })
}

/// Persist the message as `pending` and queue delivery. The caller gets the
/// pending row; delivery problems only show up on the row later.
pub async fn send_email(
    state: &SharedState,
    sent_by: Uuid,
    req: &SendEmailRequest,
) -> Result<Email, AppError> {
    let prepared = prepare(&state.templates, req)?;

    let email = db::emails::create(
        &state.pool,
        &db::emails::NewEmail {
            to_address: &prepared.to,
            subject: &prepared.subject,
            body: &prepared.body,
            template_id: prepared.template_id.as_deref(),
            sent_by: Some(sent_by),
            task_id: req.task_id,
        },
    )
    .await?;

    let pool = state.pool.clone();
    let transport = state.mailer.clone();
    let queued = email.clone();
    state
        .tasks
        .submit("email", async move { deliver(&pool, transport, &queued).await });

    Ok(email)
}

/// Hand one stored email to the transport and record the outcome on its row.
/// Returns once the transport has answered; simulated send and open delays
/// elapse afterwards on their own timer task.
pub async fn deliver(pool: &PgPool, transport: Arc<dyn EmailTransport>, email: &Email) {
    let outgoing = OutgoingEmail {
        to: email.to_address.clone(),
        subject: email.subject.clone(),
        body: email.body.clone(),
    };

    let receipt = match transport.deliver(&outgoing).await {
        Ok(receipt) => receipt,
        Err(e) => {
            tracing::warn!(email_id = %email.id, transport = transport.name(), "Email delivery failed: {e}");
            if let Err(e) = db::emails::mark_failed(pool, email.id, &e).await {
                tracing::error!(email_id = %email.id, "Failed to record email failure: {e}");
            }
            return;
        }
    };

    if receipt == DeliveryReceipt::default() {
        settle(pool.clone(), email.id, receipt).await;
    } else {
        // Simulated latency runs on a timer, not in a queue slot
        tokio::spawn(settle(pool.clone(), email.id, receipt));
    }
}

/// Mark the row sent, then opened, honouring the receipt's delays.
async fn settle(pool: PgPool, email_id: Uuid, receipt: DeliveryReceipt) {
    tokio::time::sleep(receipt.sent_after).await;
    if let Err(e) = db::emails::mark_sent(&pool, email_id).await {
        tracing::error!(%email_id, "Failed to mark email sent: {e}");
        return;
    }

    if let Some(delay) = receipt.opened_after {
        tokio::time::sleep(delay).await;
        if let Err(e) = db::emails::mark_opened(&pool, email_id).await {
            tracing::error!(%email_id, "Failed to record email open: {e}");
        }
    }
}

pub fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !value.contains(' ')
        }
        None => false,
    }
}
