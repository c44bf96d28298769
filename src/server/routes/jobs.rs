//! `/jobs` endpoints: populate, list, get, claim, start, complete, fail, release.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::server::app::AppState;
use crate::store::{Job, Pagination};

#[derive(Debug, Deserialize)]
pub struct PopulateRequest {
    pub batch_size: Option<i64>,
    pub operation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PopulateResponse {
    pub created: Vec<Uuid>,
}

pub async fn populate(
    State(state): State<AppState>,
    Json(body): Json<PopulateRequest>,
) -> AppResult<Json<PopulateResponse>> {
    let batch_size = body.batch_size.unwrap_or(state.config.populate_batch_size);
    let created = state
        .jobs
        .populate(batch_size, body.operation.as_deref(), state.config.max_pending_jobs)
        .await?;
    Ok(Json(PopulateResponse {
        created: created.into_iter().map(|j| j.id).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<Vec<Job>>> {
    let status: Option<crate::store::JobStatus> = query
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let pagination = Pagination {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };
    let jobs = state.jobs.list(status, pagination).await?;
    Ok(Json(jobs))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Job>> {
    let job = state.jobs.get(id).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub bot_id: String,
}

pub async fn claim(
    State(state): State<AppState>,
    Json(body): Json<ClaimRequest>,
) -> AppResult<Json<Option<Job>>> {
    let job = state.jobs.claim(&body.bot_id).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct BotCallerRequest {
    pub bot_id: String,
}

pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<BotCallerRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.jobs.start(id, &body.bot_id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub bot_id: String,
    pub result: Option<i64>,
    pub duration_ms: i64,
}

pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .jobs
        .complete(id, &body.bot_id, body.result, body.duration_ms)
        .await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub bot_id: String,
    pub error: String,
    pub duration_ms: i64,
}

pub async fn fail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<FailRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .jobs
        .fail(id, &body.bot_id, &body.error, body.duration_ms)
        .await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub reason: Option<String>,
}

pub async fn release(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReleaseRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.jobs.release(id, body.reason.as_deref()).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}
