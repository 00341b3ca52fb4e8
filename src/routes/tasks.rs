use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::tasks::TaskFields;
use crate::error::{AppError, AppJson};
use crate::models::task::{PRIORITIES, STATUSES};
use crate::models::Task;
use crate::routes::nullable;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.as_deref().is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.as_deref().is_some_and(|p| p != task.priority) {
            return false;
        }
        if self.assigned_to.is_some() && self.assigned_to != task.assigned_to {
            return false;
        }
        if self.category_id.is_some() && self.category_id != task.category_id {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                task.title.to_lowercase().contains(&term)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub opportunity_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Fields left out keep their current value; an explicit `null` clears a nullable one.
#[derive(Debug, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub company_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub opportunity_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatus {
    pub status: String,
}

fn validate(fields: &TaskFields) -> Result<(), AppError> {
    if fields.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if !STATUSES.contains(&fields.status.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid status '{}'. Expected one of: {}",
            fields.status,
            STATUSES.join(", ")
        )));
    }
    if !PRIORITIES.contains(&fields.priority.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid priority '{}'. Expected one of: {}",
            fields.priority,
            PRIORITIES.join(", ")
        )));
    }
    Ok(())
}

async fn load(state: &SharedState, id: Uuid) -> Result<Task, AppError> {
    db::tasks::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = db::tasks::list_all(&state.pool).await?;
    Ok(Json(tasks.into_iter().filter(|t| filter.matches(t)).collect()))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, AppError> {
    Ok(Json(load(&state, id).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<CreateTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let fields = TaskFields {
        title: req.title.trim().to_string(),
        description: req.description,
        status: req.status.unwrap_or_else(|| "todo".to_string()),
        priority: req.priority.unwrap_or_else(|| "medium".to_string()),
        category_id: req.category_id,
        assigned_to: req.assigned_to,
        company_id: req.company_id,
        opportunity_id: req.opportunity_id,
        due_date: req.due_date,
    };
    validate(&fields)?;

    let task = db::tasks::create(&state.pool, &fields, auth.user_id).await?;
    tracing::debug!(task_id = %task.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateTask>,
) -> Result<Json<Task>, AppError> {
    let existing = load(&state, id).await?;

    let fields = TaskFields {
        title: req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title),
        description: req.description.unwrap_or(existing.description),
        status: req.status.unwrap_or(existing.status),
        priority: req.priority.unwrap_or(existing.priority),
        category_id: req.category_id.unwrap_or(existing.category_id),
        assigned_to: req.assigned_to.unwrap_or(existing.assigned_to),
        company_id: req.company_id.unwrap_or(existing.company_id),
        opportunity_id: req.opportunity_id.unwrap_or(existing.opportunity_id),
        due_date: req.due_date.unwrap_or(existing.due_date),
    };
    validate(&fields)?;

    let task = db::tasks::update(&state.pool, id, &fields).await?;
    Ok(Json(task))
}

pub async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateStatus>,
) -> Result<Json<Task>, AppError> {
    if !STATUSES.contains(&req.status.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid status '{}'. Expected one of: {}",
            req.status,
            STATUSES.join(", ")
        )));
    }
    load(&state, id).await?;

    let task = db::tasks::set_status(&state.pool, id, &req.status).await?;
    Ok(Json(task))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::tasks::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Task not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
