//! `/operations` — the registry's name set, as loaded once at startup.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub names: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<OperationsResponse> {
    Json(OperationsResponse {
        names: state.registry.names(),
    })
}
