use std::sync::Arc;

use uuid::Uuid;

use crate::datalake::Datalake;
use crate::error::{AppError, AppResult};
use crate::registry::OperationRegistry;
use crate::store::{Job, JobStatus, Pagination, Store};

/// Implements every Job state transition. The only correctness-critical
/// component: the claim protocol it wraps guarantees exactly-once
/// assignment under concurrent callers (see [`Store::claim_job`]).
#[derive(Clone)]
pub struct JobService {
    store: Store,
    registry: OperationRegistry,
    datalake: Arc<dyn Datalake>,
}

impl JobService {
    pub fn new(store: Store, registry: OperationRegistry, datalake: Arc<dyn Datalake>) -> Self {
        Self {
            store,
            registry,
            datalake,
        }
    }

    pub async fn create(&self, a: i64, b: i64, operation: &str) -> AppResult<Job> {
        if !self.registry.contains(operation) {
            return Err(AppError::BadRequest(format!(
                "unknown operation '{operation}'"
            )));
        }
        let job = self.store.create_job(a, b, operation).await?;
        tracing::info!(job_id = %job.id, operation, "job created");
        Ok(job)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Job> {
        self.store.get_job(id).await?.ok_or(AppError::NotFound("job"))
    }

    pub async fn list(&self, status: Option<JobStatus>, pagination: Pagination) -> AppResult<Vec<Job>> {
        self.store.list_jobs(status, pagination).await
    }

    /// Job counts grouped by status, for `GET /metrics/summary`.
    pub async fn status_counts(&self) -> AppResult<Vec<(JobStatus, i64)>> {
        self.store.job_status_counts().await
    }

    /// Returns `Ok(None)` when there is no matching pending job; this is not
    /// an error, callers poll.
    pub async fn claim(&self, bot_id: &str) -> AppResult<Option<Job>> {
        let job = self.store.claim_job(bot_id).await?;
        if let Some(job) = &job {
            tracing::info!(job_id = %job.id, bot_id, operation = %job.operation, "job claimed");
        }
        Ok(job)
    }

    pub async fn start(&self, id: Uuid, bot_id: &str) -> AppResult<Job> {
        let job = self.store.start_job(id, bot_id).await?;
        tracing::info!(job_id = %job.id, bot_id, "job started");
        Ok(job)
    }

    pub async fn complete(
        &self,
        id: Uuid,
        bot_id: &str,
        result: Option<i64>,
        duration_ms: i64,
    ) -> AppResult<Job> {
        let (job, result_record) = self.store.complete_job(id, bot_id, result, duration_ms).await?;
        tracing::info!(job_id = %job.id, bot_id, "job completed");
        self.datalake.append(&result_record).await;
        Ok(job)
    }

    pub async fn fail(
        &self,
        id: Uuid,
        bot_id: &str,
        error: &str,
        duration_ms: i64,
    ) -> AppResult<Job> {
        let (job, result_record) = self.store.fail_job(id, bot_id, error, duration_ms).await?;
        tracing::warn!(job_id = %job.id, bot_id, error, "job failed");
        self.datalake.append(&result_record).await;
        Ok(job)
    }

    /// Admin-only: forces a non-terminal job back to `pending`.
    pub async fn release(&self, id: Uuid, reason: Option<&str>) -> AppResult<Job> {
        let job = self.store.release_job(id, reason).await?;
        tracing::warn!(job_id = %job.id, reason, "job released");
        Ok(job)
    }

    /// Creates a batch of jobs with randomly chosen operands and operation,
    /// respecting the ceiling on total pending jobs. Used by the Populator
    /// monitor and by the admin ad-hoc trigger.
    pub async fn populate(
        &self,
        batch_size: i64,
        operation: Option<&str>,
        max_pending_jobs: i64,
    ) -> AppResult<Vec<Job>> {
        if batch_size < 0 {
            return Err(AppError::BadRequest(format!(
                "batch_size must not be negative, got {batch_size}"
            )));
        }
        if let Some(op) = operation {
            if !self.registry.contains(op) {
                return Err(AppError::BadRequest(format!("unknown operation '{op}'")));
            }
        }

        let pending = self.store.count_pending_jobs().await?;
        let room = (max_pending_jobs - pending).max(0);
        let to_create = batch_size.min(room);
        if to_create < batch_size {
            tracing::warn!(
                pending,
                max_pending_jobs,
                requested = batch_size,
                creating = to_create,
                "populate truncated by pending-job ceiling"
            );
        }

        let names = self.registry.names();
        if names.is_empty() && operation.is_none() {
            return Err(AppError::BadRequest("no operations registered".to_string()));
        }

        let mut created = Vec::with_capacity(to_create as usize);
        for _ in 0..to_create {
            let op = match operation {
                Some(op) => op.to_string(),
                None => pick_random(&names),
            };
            let a = random_operand();
            let b = random_operand();
            created.push(self.store.create_job(a, b, &op).await?);
        }
        tracing::info!(count = created.len(), "populated jobs");
        Ok(created)
    }
}

impl JobService {
    /// Jobs stuck in `claimed` past `older_than`, oldest first. Read by
    /// `ClaimedJobMonitor`; recovery itself goes through [`JobService::release`].
    pub async fn find_stuck_claimed(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
        limit: i64,
    ) -> AppResult<Vec<Job>> {
        self.store.find_stuck_claimed_jobs(older_than, limit).await
    }

    /// Jobs stuck in `processing` past `older_than`, oldest first.
    pub async fn find_stuck_processing(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
        limit: i64,
    ) -> AppResult<Vec<Job>> {
        self.store.find_stuck_processing_jobs(older_than, limit).await
    }

    /// Terminal-fails a stuck `processing` job on the monitor's behalf (no
    /// claimed_by check — by definition the bot has gone silent). No-op if
    /// the job has already moved on by the time this runs.
    pub async fn force_timeout_fail(&self, id: Uuid, error: &str) -> AppResult<Option<Job>> {
        let outcome = self.store.force_fail_job(id, error).await?;
        let Some((job, result_record)) = outcome else {
            return Ok(None);
        };
        tracing::warn!(job_id = %job.id, error, "job force-failed on timeout");
        self.datalake.append(&result_record).await;
        Ok(Some(job))
    }
}

fn pick_random(names: &[String]) -> String {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..names.len());
    names[idx].clone()
}

fn random_operand() -> i64 {
    use rand::Rng;
    rand::thread_rng().gen_range(1..1000)
}
