use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap());

/// Replace `{key}` placeholders whose key is in `vars`. Anything else is left verbatim.
pub fn substitute(text: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &regex::Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    System,
    Custom,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub category: TemplateCategory,
    pub subject: &'static str,
    pub body: &'static str,
    pub variables: &'static [&'static str],
    /// Display grouping only.
    pub assigned_user_id: Option<Uuid>,
}

impl EmailTemplate {
    pub fn render(&self, vars: &HashMap<String, String>) -> (String, String) {
        (substitute(self.subject, vars), substitute(self.body, vars))
    }
}

/// Fixed set of templates, built once at startup.
pub struct TemplateRegistry {
    templates: Vec<EmailTemplate>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                EmailTemplate {
                    id: "task-assignment",
                    name: "Task Assignment",
                    category: TemplateCategory::System,
                    subject: "New task assigned: {task_title}",
                    body: "Hi {assignee_name},\n\n\
                           You have been assigned \"{task_title}\" (priority: {priority}).\n\
                           Due: {due_date}\n\n\
                           {task_description}\n\n\
                           Assigned by {assigner_name}",
                    variables: &[
                        "assignee_name",
                        "task_title",
                        "priority",
                        "due_date",
                        "task_description",
                        "assigner_name",
                    ],
                    assigned_user_id: None,
                },
                EmailTemplate {
                    id: "task-completion",
                    name: "Task Completed",
                    category: TemplateCategory::System,
                    subject: "Task completed: {task_title}",
                    body: "Hi {recipient_name},\n\n\
                           \"{task_title}\" was marked as done by {completed_by} on {completed_at}.",
                    variables: &["recipient_name", "task_title", "completed_by", "completed_at"],
                    assigned_user_id: None,
                },
                EmailTemplate {
                    id: "weekly-report",
                    name: "Weekly Report",
                    category: TemplateCategory::System,
                    subject: "Weekly summary for {week_of}",
                    body: "Hi {recipient_name},\n\n\
                           This week: {tasks_completed} tasks completed, {tasks_open} still open, \
                           {emails_sent} emails sent.\n\n\
                           {summary}",
                    variables: &[
                        "recipient_name",
                        "week_of",
                        "tasks_completed",
                        "tasks_open",
                        "emails_sent",
                        "summary",
                    ],
                    assigned_user_id: None,
                },
                EmailTemplate {
                    id: "report-ready",
                    name: "Report Ready",
                    category: TemplateCategory::System,
                    subject: "Your report \"{report_title}\" is ready",
                    body: "Hi {recipient_name},\n\n\
                           The {report_type} report you requested finished generating \
                           ({page_count} pages).",
                    variables: &["recipient_name", "report_title", "report_type", "page_count"],
                    assigned_user_id: None,
                },
                EmailTemplate {
                    id: "welcome",
                    name: "Welcome",
                    category: TemplateCategory::System,
                    subject: "Welcome to Wish Desk, {name}",
                    body: "Hi {name},\n\n\
                           An account has been created for you with the {role} role. \
                           Sign in with {email}.",
                    variables: &["name", "role", "email"],
                    assigned_user_id: None,
                },
                EmailTemplate {
                    id: "follow-up",
                    name: "Client Follow-up",
                    category: TemplateCategory::Custom,
                    subject: "Following up on {topic}",
                    body: "Hi {contact_name},\n\n\
                           Thanks for your time discussing {topic}. {next_steps}\n\n\
                           Best,\n{sender_name}",
                    variables: &["contact_name", "topic", "next_steps", "sender_name"],
                    assigned_user_id: None,
                },
                EmailTemplate {
                    id: "meeting-request",
                    name: "Meeting Request",
                    category: TemplateCategory::Custom,
                    subject: "Meeting request: {topic}",
                    body: "Hi {contact_name},\n\n\
                           Would {proposed_time} work for a call about {topic}?\n\n\
                           Best,\n{sender_name}",
                    variables: &["contact_name", "topic", "proposed_time", "sender_name"],
                    assigned_user_id: None,
                },
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&EmailTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn list(&self) -> &[EmailTemplate] {
        &self.templates
    }
}
