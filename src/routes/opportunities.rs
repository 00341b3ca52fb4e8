use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::opportunities::OpportunityFields;
use crate::error::{AppError, AppJson};
use crate::models::opportunity::STAGES;
use crate::models::Opportunity;
use crate::routes::nullable;
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct OpportunityFilter {
    pub stage: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpportunityRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub value: Option<i64>,
    pub stage: Option<String>,
    pub probability: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub expected_close: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub owner_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

fn validate(fields: &OpportunityFields) -> Result<(), AppError> {
    if fields.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if fields.company.trim().is_empty() {
        return Err(AppError::Validation("Company is required".to_string()));
    }
    if fields.value < 0 {
        return Err(AppError::Validation("Value cannot be negative".to_string()));
    }
    if !(0..=100).contains(&fields.probability) {
        return Err(AppError::Validation(
            "Probability must be between 0 and 100".to_string(),
        ));
    }
    if !STAGES.contains(&fields.stage.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid stage '{}'. Expected one of: {}",
            fields.stage,
            STAGES.join(", ")
        )));
    }
    Ok(())
}

async fn load(state: &SharedState, id: Uuid) -> Result<Opportunity, AppError> {
    db::opportunities::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Opportunity not found".to_string()))
}

pub async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<OpportunityFilter>,
) -> Result<Json<Vec<Opportunity>>, AppError> {
    let search = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let opportunities = db::opportunities::list_all(&state.pool)
        .await?
        .into_iter()
        .filter(|o| filter.stage.as_deref().is_none_or(|stage| o.stage == stage))
        .filter(|o| {
            search.as_deref().is_none_or(|term| {
                o.title.to_lowercase().contains(term) || o.company.to_lowercase().contains(term)
            })
        })
        .collect();

    Ok(Json(opportunities))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Opportunity>, AppError> {
    Ok(Json(load(&state, id).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<OpportunityRequest>,
) -> Result<(StatusCode, Json<Opportunity>), AppError> {
    let fields = OpportunityFields {
        title: req.title.unwrap_or_default().trim().to_string(),
        company: req.company.unwrap_or_default().trim().to_string(),
        value: req.value.unwrap_or(0),
        stage: req.stage.unwrap_or_else(|| "lead".to_string()),
        probability: req.probability.unwrap_or(0),
        expected_close: req.expected_close.flatten(),
        owner_id: req.owner_id.flatten().or(Some(auth.user_id)),
        notes: req.notes.flatten(),
    };
    validate(&fields)?;

    let opportunity = db::opportunities::create(&state.pool, &fields).await?;
    Ok((StatusCode::CREATED, Json(opportunity)))
}

pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<OpportunityRequest>,
) -> Result<Json<Opportunity>, AppError> {
    let existing = load(&state, id).await?;

    let fields = OpportunityFields {
        title: req.title.map(|t| t.trim().to_string()).unwrap_or(existing.title),
        company: req.company.map(|c| c.trim().to_string()).unwrap_or(existing.company),
        value: req.value.unwrap_or(existing.value),
        stage: req.stage.unwrap_or(existing.stage),
        probability: req.probability.unwrap_or(existing.probability),
        expected_close: req.expected_close.unwrap_or(existing.expected_close),
        owner_id: req.owner_id.unwrap_or(existing.owner_id),
        notes: req.notes.unwrap_or(existing.notes),
    };
    validate(&fields)?;

    let opportunity = db::opportunities::update(&state.pool, id, &fields).await?;
    Ok(Json(opportunity))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !db::opportunities::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Opportunity not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
