//! `/metrics/summary` — counts by status, for dashboards and operators.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::server::app::AppState;

#[derive(Debug, Serialize)]
pub struct MetricsSummary {
    pub jobs_by_status: HashMap<String, i64>,
    pub bots_by_computed_status: HashMap<String, i64>,
}

pub async fn summary(State(state): State<AppState>) -> AppResult<Json<MetricsSummary>> {
    let job_counts = state.jobs.status_counts().await?;
    let jobs_by_status = job_counts
        .into_iter()
        .map(|(status, count)| (format!("{status:?}").to_lowercase(), count))
        .collect();

    let bots = state.bots.list(false).await?;
    let mut bots_by_computed_status: HashMap<String, i64> = HashMap::new();
    for (_, status) in &bots {
        let key = format!("{status:?}").to_lowercase();
        *bots_by_computed_status.entry(key).or_insert(0) += 1;
    }

    Ok(Json(MetricsSummary {
        jobs_by_status,
        bots_by_computed_status,
    }))
}
