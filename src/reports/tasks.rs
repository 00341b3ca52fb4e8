use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{count_by, rate, Markdown, ReportError, ReportGenerator, ReportParams};
use crate::db;
use crate::models::{Task, TaskCategory, User};

pub struct TaskSummaryReport;

#[async_trait]
impl ReportGenerator for TaskSummaryReport {
    fn id(&self) -> &str {
        "task-summary"
    }

    fn name(&self) -> &str {
        "Task Summary"
    }

    fn description(&self) -> &str {
        "Task counts by status, priority and category, completion rate and overdue work"
    }

    async fn generate(&self, pool: &PgPool, params: &ReportParams) -> Result<String, ReportError> {
        let tasks = db::tasks::list_all(pool).await?;
        let categories = db::task_categories::list(pool).await?;
        Ok(render_task_summary(&tasks, &categories, params, Utc::now()))
    }
}

pub fn render_task_summary(
    tasks: &[Task],
    categories: &[TaskCategory],
    params: &ReportParams,
    now: DateTime<Utc>,
) -> String {
    let tasks: Vec<Task> = tasks
        .iter()
        .filter(|t| params.includes(t.created_at, now))
        .cloned()
        .collect();
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.is_done()).count();

    let mut overdue: Vec<&Task> = tasks.iter().filter(|t| t.is_overdue(now)).collect();
    overdue.sort_by_key(|t| t.due_date);

    let category_names: HashMap<Uuid, &str> =
        categories.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut doc = Markdown::new("Task Summary Report", params, now);

    doc.section("Overview")
        .bullet(format!("Total tasks: {total}"))
        .bullet(format!("Completed: {completed}"))
        .bullet(format!("Open: {}", total - completed))
        .bullet(format!("Completion rate: {:.1}%", rate(completed, total)))
        .bullet(format!("Overdue: {}", overdue.len()));

    doc.section("By Status")
        .counts(&count_by(&tasks, |t| t.status.clone()), total);

    doc.section("By Priority")
        .counts(&count_by(&tasks, |t| t.priority.clone()), total);

    doc.section("By Category").counts(
        &count_by(&tasks, |t| {
            t.category_id
                .and_then(|id| category_names.get(&id).map(|name| name.to_string()))
                .unwrap_or_else(|| "Uncategorized".to_string())
        }),
        total,
    );

    doc.section("Overdue Tasks");
    if overdue.is_empty() {
        doc.bullet("None");
    }
    for task in overdue.iter().take(params.top_n) {
        let due = task
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        doc.bullet(format!("{} (due {due}, {} priority)", task.title, task.priority));
    }
    if overdue.len() > params.top_n {
        doc.line(format!("...and {} more", overdue.len() - params.top_n));
    }

    doc.finish()
}

pub struct TeamProductivityReport;

#[async_trait]
impl ReportGenerator for TeamProductivityReport {
    fn id(&self) -> &str {
        "team-productivity"
    }

    fn name(&self) -> &str {
        "Team Productivity"
    }

    fn description(&self) -> &str {
        "Assigned and completed tasks per team member with top performers"
    }

    async fn generate(&self, pool: &PgPool, params: &ReportParams) -> Result<String, ReportError> {
        let tasks = db::tasks::list_all(pool).await?;
        let users = db::users::list_all(pool).await?;
        Ok(render_team_productivity(&tasks, &users, params, Utc::now()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MemberStats {
    assigned: usize,
    completed: usize,
    overdue: usize,
}

pub fn render_team_productivity(
    tasks: &[Task],
    users: &[User],
    params: &ReportParams,
    now: DateTime<Utc>,
) -> String {
    let tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| params.includes(t.created_at, now))
        .collect();

    let mut stats: HashMap<Uuid, MemberStats> = HashMap::new();
    let mut unassigned = 0;
    for task in &tasks {
        let Some(assignee) = task.assigned_to else {
            unassigned += 1;
            continue;
        };
        let entry = stats.entry(assignee).or_default();
        entry.assigned += 1;
        if task.is_done() {
            entry.completed += 1;
        }
        if task.is_overdue(now) {
            entry.overdue += 1;
        }
    }

    let display_name = |id: &Uuid| {
        users
            .iter()
            .find(|u| u.id == *id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| format!("Unknown user {id}"))
    };

    let mut members: Vec<(String, MemberStats)> = stats
        .iter()
        .map(|(id, s)| (display_name(id), *s))
        .collect();
    members.sort_by(|a, b| {
        b.1.completed
            .cmp(&a.1.completed)
            .then_with(|| a.0.cmp(&b.0))
    });

    let total_completed: usize = members.iter().map(|(_, s)| s.completed).sum();
    let active_users = users.iter().filter(|u| u.is_active).count();

    let mut doc = Markdown::new("Team Productivity Report", params, now);

    doc.section("Overview")
        .bullet(format!("Active team members: {active_users}"))
        .bullet(format!("Members with assigned tasks: {}", members.len()))
        .bullet(format!("Tasks considered: {}", tasks.len()))
        .bullet(format!("Unassigned tasks: {unassigned}"))
        .bullet(format!(
            "Team completion rate: {:.1}%",
            rate(total_completed, tasks.len() - unassigned)
        ));

    doc.section("Per Member");
    if members.is_empty() {
        doc.bullet("No assigned tasks");
    }
    for (name, s) in &members {
        doc.bullet(format!(
            "{name}: {} assigned, {} completed ({:.1}%), {} overdue",
            s.assigned,
            s.completed,
            rate(s.completed, s.assigned),
            s.overdue
        ));
    }

    doc.section(&format!("Top {} Performers", params.top_n));
    let top: Vec<_> = members.iter().filter(|(_, s)| s.completed > 0).take(params.top_n).collect();
    if top.is_empty() {
        doc.bullet("No completed tasks yet");
    }
    for (rank, (name, s)) in top.iter().enumerate() {
        doc.line(format!("{}. {name} ({} completed)", rank + 1, s.completed));
    }

    doc.finish()
}
