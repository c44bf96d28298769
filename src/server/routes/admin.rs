//! Admin-only endpoints: ad-hoc retention cleanup and its run history.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::monitors::CleanupReport;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn cleanup(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> AppResult<Json<CleanupReport>> {
    let report = state
        .cleaner
        .run_once(&state.config, &state.bots, query.dry_run)
        .await
        .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct CleanupStatusResponse {
    pub history: Vec<CleanupReport>,
    pub next_run: chrono::DateTime<chrono::Utc>,
}

pub async fn cleanup_status(State(state): State<AppState>) -> Json<CleanupStatusResponse> {
    let history = state.cleaner.history().await;
    let interval = chrono::Duration::from_std(state.config.cleanup_interval)
        .unwrap_or_else(|_| chrono::Duration::hours(6));
    let next_run = history
        .last()
        .map(|r| r.ran_at + interval)
        .unwrap_or_else(|| chrono::Utc::now() + interval);
    Json(CleanupStatusResponse { history, next_run })
}
