use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Claimed,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Ordering key used by job listing: pending < claimed < processing <
    /// succeeded < failed, so operators see actionable work first.
    pub fn priority(&self) -> i32 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Claimed => 1,
            JobStatus::Processing => 2,
            JobStatus::Succeeded => 3,
            JobStatus::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "claimed" => Ok(JobStatus::Claimed),
            "processing" => Ok(JobStatus::Processing),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "bot_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Idle,
    Busy,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "bot_health_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BotHealthStatus {
    Normal,
    PotentiallyStuck,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "result_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub a: i64,
    pub b: i64,
    pub operation: String,
    pub status: JobStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub attempts: i32,
    pub error: Option<String>,
    pub version: i32,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Bot {
    pub id: String,
    pub status: BotStatus,
    pub current_job_id: Option<Uuid>,
    pub assigned_operation: Option<String>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub health_status: BotHealthStatus,
    pub stuck_job_id: Option<Uuid>,
    pub health_checked_at: Option<DateTime<Utc>>,
}

/// The status value reported on the wire: overrides the stored `status`
/// with derived `deleted`/`down` states, per the liveness rules in
/// [`crate::services::bot_service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedStatus {
    Idle,
    Busy,
    Down,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotView {
    #[serde(flatten)]
    pub bot: Bot,
    pub computed_status: ComputedStatus,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub a: i64,
    pub b: i64,
    pub operation: String,
    pub result: Option<i64>,
    pub processed_by: String,
    pub processed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: ResultStatus,
    pub error: Option<String>,
}

/// A status filter for listing operations. `None` means "all statuses".
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
