//! Liveness probes: a deep `/healthz` that checks the store, and a trivial
//! root probe independent of the database.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
}

pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        sqlx::query("SELECT 1").execute(state.store.pool()),
    )
    .await
    .map(|r| r.is_ok())
    .unwrap_or(false);

    let status = if healthy { "healthy" } else { "unhealthy" };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(HealthResponse { status: status.to_string() }))
}

pub async fn root() -> &'static str {
    "coordinator is running"
}
