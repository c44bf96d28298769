//! `/bots` endpoints: register, heartbeat, assign-operation, delete, reset, list.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::server::app::AppState;
use crate::store::{Bot, BotView};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub assigned_operation: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<Bot>> {
    let bot = state
        .bots
        .register(&body.id, body.assigned_operation.as_deref())
        .await?;
    Ok(Json(bot))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(body): Json<HeartbeatRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.bots.heartbeat(&body.id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct AssignOperationRequest {
    pub operation: Option<String>,
}

pub async fn assign_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignOperationRequest>,
) -> AppResult<Json<Bot>> {
    let bot = state.bots.assign_operation(&id, body.operation.as_deref()).await?;
    Ok(Json(bot))
}

pub async fn soft_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.bots.soft_delete(&id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Bot>> {
    let bot = state.bots.reset(&id).await?;
    Ok(Json(bot))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<BotView>>> {
    let bots = state.bots.list(false).await?;
    Ok(Json(
        bots.into_iter()
            .map(|(bot, computed_status)| BotView { bot, computed_status })
            .collect(),
    ))
}
