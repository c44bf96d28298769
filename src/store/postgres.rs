use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::models::{Bot, BotStatus, Job, JobStatus, Pagination, ResultRecord, ResultStatus};

const JOB_COLUMNS: &str = "id, a, b, operation, status, claimed_by, claimed_at, started_at, \
    finished_at, created_at, attempts, error, version";

/// Transactional access to Jobs, Bots, and Results. Every multi-statement
/// operation here runs inside its own transaction so a cancelled request
/// never leaves partial state. No method accepts caller-supplied SQL.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(5)
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(AppError::from)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(AppError::from)
    }

    // ---- Jobs: reads ----

    pub async fn get_job(&self, id: Uuid) -> AppResult<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        pagination: Pagination,
    ) -> AppResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE $1::job_status IS NULL OR status = $1
             ORDER BY
                CASE status
                    WHEN 'pending' THEN 0
                    WHEN 'claimed' THEN 1
                    WHEN 'processing' THEN 2
                    WHEN 'succeeded' THEN 3
                    WHEN 'failed' THEN 4
                END,
                created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn count_pending_jobs(&self) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM jobs WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Job counts grouped by status, for the admin metrics summary.
    /// Statuses with zero jobs are simply absent from the result.
    pub async fn job_status_counts(&self) -> AppResult<Vec<(JobStatus, i64)>> {
        let rows: Vec<(JobStatus, i64)> =
            sqlx::query_as("SELECT status, count(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    // ---- Jobs: writes ----

    pub async fn create_job(&self, a: i64, b: i64, operation: &str) -> AppResult<Job> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs (a, b, operation) VALUES ($1, $2, $3)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(a)
        .bind(b)
        .bind(operation)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// The atomic claim protocol: locks the bot row, rejects unknown/busy
    /// bots, then selects the oldest matching pending job with
    /// `FOR UPDATE SKIP LOCKED` so a locked candidate never blocks other
    /// claimers. On success, pins an unassigned bot to the job's operation
    /// in the same transaction.
    pub async fn claim_job(&self, bot_id: &str) -> AppResult<Option<Job>> {
        let mut tx = self.begin().await?;

        let bot = sqlx::query_as::<_, Bot>(
            "SELECT * FROM bots WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(bot_id)
        .fetch_optional(&mut *tx)
        .await?;

        let bot = bot.ok_or(AppError::NotFound("bot"))?;
        if bot.current_job_id.is_some() {
            return Err(AppError::conflict("BusyBot", "bot already holds a job"));
        }

        let job = sqlx::query_as::<_, Job>(&format!(
            "WITH candidate AS (
                SELECT id FROM jobs
                WHERE status = 'pending'
                  AND ($2::text IS NULL OR operation = $2)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
             )
             UPDATE jobs
             SET status = 'claimed', claimed_by = $1, claimed_at = now(), version = version + 1
             WHERE id IN (SELECT id FROM candidate)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(bot_id)
        .bind(&bot.assigned_operation)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE bots
             SET current_job_id = $1, status = 'busy',
                 assigned_operation = COALESCE(assigned_operation, $2)
             WHERE id = $3",
        )
        .bind(job.id)
        .bind(&job.operation)
        .bind(bot_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    /// Idempotent-on-replay: succeeds again if the job is already
    /// `processing` for the same caller.
    pub async fn start_job(&self, job_id: Uuid, bot_id: &str) -> AppResult<Job> {
        let mut tx = self.begin().await?;
        let job = self.lock_job(&mut tx, job_id).await?;

        if job.claimed_by.as_deref() != Some(bot_id) {
            return Err(AppError::conflict("NotClaimedByCaller", "job is not claimed by this bot"));
        }
        if job.status == JobStatus::Processing {
            tx.commit().await?;
            return Ok(job);
        }
        if job.status != JobStatus::Claimed {
            return Err(AppError::conflict(
                "job_state_consistency",
                format!("cannot start a job in status {:?}", job.status),
            ));
        }

        let updated = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET status = 'processing', started_at = now(), version = version + 1
             WHERE id = $1
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Writes the terminal Result row, clears the bot binding, and marks the
    /// bot idle, all in one transaction. Idempotent on replay with matching
    /// arguments; conflicting replays (or completing after a fail) return
    /// `Conflict`.
    pub async fn complete_job(
        &self,
        job_id: Uuid,
        bot_id: &str,
        result: Option<i64>,
        duration_ms: i64,
    ) -> AppResult<(Job, ResultRecord)> {
        self.terminate_job(job_id, bot_id, ResultStatus::Succeeded, result, None, duration_ms)
            .await
    }

    pub async fn fail_job(
        &self,
        job_id: Uuid,
        bot_id: &str,
        error: &str,
        duration_ms: i64,
    ) -> AppResult<(Job, ResultRecord)> {
        self.terminate_job(
            job_id,
            bot_id,
            ResultStatus::Failed,
            None,
            Some(error.to_string()),
            duration_ms,
        )
        .await
    }

    async fn terminate_job(
        &self,
        job_id: Uuid,
        bot_id: &str,
        status: ResultStatus,
        result: Option<i64>,
        error: Option<String>,
        duration_ms: i64,
    ) -> AppResult<(Job, ResultRecord)> {
        let mut tx = self.begin().await?;
        let job = self.lock_job(&mut tx, job_id).await?;

        if job.claimed_by.as_deref() != Some(bot_id) {
            return Err(AppError::conflict("NotClaimedByCaller", "job is not claimed by this bot"));
        }

        if job.status.is_terminal() {
            let existing = sqlx::query_as::<_, ResultRecord>(
                "SELECT * FROM results WHERE job_id = $1",
            )
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;

            let matches_target_status =
                (job.status == JobStatus::Succeeded) == (status == ResultStatus::Succeeded);
            if matches_target_status && existing.result == result && existing.error == error {
                tx.commit().await?;
                return Ok((job, existing));
            }
            return Err(AppError::conflict("AlreadyTerminal", "job already reached a terminal state"));
        }

        if job.status != JobStatus::Processing {
            return Err(AppError::conflict(
                "job_state_consistency",
                format!("cannot terminate a job in status {:?}", job.status),
            ));
        }

        let job_status = match status {
            ResultStatus::Succeeded => JobStatus::Succeeded,
            ResultStatus::Failed => JobStatus::Failed,
        };

        let updated = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET status = $2, finished_at = now(), error = $3, version = version + 1
             WHERE id = $1
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(job_status)
        .bind(&error)
        .fetch_one(&mut *tx)
        .await?;

        let result_record = sqlx::query_as::<_, ResultRecord>(
            "INSERT INTO results (job_id, a, b, operation, result, processed_by, duration_ms, status, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(job_id)
        .bind(updated.a)
        .bind(updated.b)
        .bind(&updated.operation)
        .bind(result)
        .bind(bot_id)
        .bind(duration_ms)
        .bind(status)
        .bind(&error)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE bots SET current_job_id = NULL, status = 'idle' WHERE id = $1 AND current_job_id = $2",
        )
        .bind(bot_id)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((updated, result_record))
    }

    /// Admin-only: forces a non-terminal job back to `pending`, clears
    /// bindings on both sides, bumps `attempts`.
    pub async fn release_job(&self, job_id: Uuid, reason: Option<&str>) -> AppResult<Job> {
        let mut tx = self.begin().await?;
        let job = self.lock_job(&mut tx, job_id).await?;

        if job.status == JobStatus::Pending {
            return Err(AppError::BadRequest("job is already pending".to_string()));
        }
        if job.status.is_terminal() {
            return Err(AppError::BadRequest("cannot release a terminal job".to_string()));
        }

        let updated = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs
             SET status = 'pending', claimed_by = NULL, claimed_at = NULL,
                 started_at = NULL, attempts = attempts + 1, error = $2, version = version + 1
             WHERE id = $1
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(bot_id) = &job.claimed_by {
            sqlx::query(
                "UPDATE bots SET current_job_id = NULL, status = 'idle' WHERE id = $1 AND current_job_id = $2",
            )
            .bind(bot_id)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn lock_job(&self, tx: &mut PgConnection, job_id: Uuid) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(tx)
        .await?
        .ok_or(AppError::NotFound("job"))
    }

    /// Jobs in `claimed` whose `claimed_at` predates `older_than`, oldest
    /// first, capped at `limit`. Used by `ClaimedJobMonitor`.
    pub async fn find_stuck_claimed_jobs(
        &self,
        older_than: chrono::DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE status = 'claimed' AND claimed_at < $1
             ORDER BY claimed_at ASC
             LIMIT $2"
        ))
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Jobs in `processing` whose `started_at` predates `older_than`.
    pub async fn find_stuck_processing_jobs(
        &self,
        older_than: chrono::DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE status = 'processing' AND started_at < $1
             ORDER BY started_at ASC
             LIMIT $2"
        ))
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Terminal-fails a stuck `processing` job directly (no bot to call
    /// `fail` on its behalf), writing a Result row and freeing the bot.
    pub async fn force_fail_job(&self, job_id: Uuid, error: &str) -> AppResult<Option<(Job, ResultRecord)>> {
        let mut tx = self.begin().await?;
        let job = self.lock_job(&mut tx, job_id).await?;

        if job.status != JobStatus::Processing {
            tx.commit().await?;
            return Ok(None);
        }

        let updated = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET status = 'failed', finished_at = now(), error = $2, version = version + 1
             WHERE id = $1
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_id)
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

        let result_record = sqlx::query_as::<_, ResultRecord>(
            "INSERT INTO results (job_id, a, b, operation, result, processed_by, duration_ms, status, error)
             VALUES ($1, $2, $3, $4, NULL, $5, 0, 'failed', $6)
             RETURNING *",
        )
        .bind(job_id)
        .bind(updated.a)
        .bind(updated.b)
        .bind(&updated.operation)
        .bind(updated.claimed_by.as_deref().unwrap_or("unknown"))
        .bind(error)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(bot_id) = &job.claimed_by {
            sqlx::query(
                "UPDATE bots SET current_job_id = NULL, status = 'idle' WHERE id = $1 AND current_job_id = $2",
            )
            .bind(bot_id)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some((updated, result_record)))
    }

    // ---- Bots ----

    pub async fn get_bot(&self, id: &str) -> AppResult<Option<Bot>> {
        let bot = sqlx::query_as::<_, Bot>("SELECT * FROM bots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bot)
    }

    pub async fn list_bots(&self, include_deleted: bool) -> AppResult<Vec<Bot>> {
        let bots = sqlx::query_as::<_, Bot>(
            "SELECT * FROM bots WHERE deleted_at IS NULL OR $1 ORDER BY id",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(bots)
    }

    /// Idempotent on id. Revives a soft-deleted bot of the same id rather
    /// than creating a new row; preserves its existing `assigned_operation`
    /// unless the caller explicitly supplies a new one.
    pub async fn register_bot(
        &self,
        id: &str,
        assigned_operation: Option<&str>,
    ) -> AppResult<Bot> {
        let bot = sqlx::query_as::<_, Bot>(
            "INSERT INTO bots (id, assigned_operation)
             VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE
                SET deleted_at = NULL,
                    assigned_operation = COALESCE($2, bots.assigned_operation),
                    last_heartbeat_at = now()
             RETURNING *",
        )
        .bind(id)
        .bind(assigned_operation)
        .fetch_one(&self.pool)
        .await?;
        Ok(bot)
    }

    pub async fn heartbeat_bot(&self, id: &str) -> AppResult<Bot> {
        let bot = sqlx::query_as::<_, Bot>(
            "UPDATE bots SET last_heartbeat_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("bot"))?;
        Ok(bot)
    }

    pub async fn assign_operation(&self, id: &str, operation: Option<&str>) -> AppResult<Bot> {
        let bot = sqlx::query_as::<_, Bot>(
            "UPDATE bots SET assigned_operation = $2
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(id)
        .bind(operation)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("bot"))?;
        Ok(bot)
    }

    /// Soft-deletes the bot; if it holds a job, releases that job first so
    /// no pending job is orphaned on a dead bot.
    pub async fn soft_delete_bot(&self, id: &str) -> AppResult<()> {
        let mut tx = self.begin().await?;
        let bot = sqlx::query_as::<_, Bot>("SELECT * FROM bots WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("bot"))?;

        if let Some(job_id) = bot.current_job_id {
            sqlx::query(
                "UPDATE jobs
                 SET status = 'pending', claimed_by = NULL, claimed_at = NULL,
                     started_at = NULL, attempts = attempts + 1,
                     error = 'bot-soft-deleted', version = version + 1
                 WHERE id = $1 AND status <> 'pending'",
            )
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE bots SET deleted_at = now(), current_job_id = NULL, status = 'idle' WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Admin escape hatch: clears any binding and resets health, regardless
    /// of the bound job's current status.
    pub async fn reset_bot(&self, id: &str) -> AppResult<Bot> {
        let mut tx = self.begin().await?;
        let bot = sqlx::query_as::<_, Bot>("SELECT * FROM bots WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("bot"))?;

        if let Some(job_id) = bot.current_job_id {
            sqlx::query(
                "UPDATE jobs
                 SET status = 'pending', claimed_by = NULL, claimed_at = NULL,
                     started_at = NULL, attempts = attempts + 1,
                     error = 'bot-reset', version = version + 1
                 WHERE id = $1 AND status <> 'pending'",
            )
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, Bot>(
            "UPDATE bots
             SET current_job_id = NULL, status = 'idle', health_status = 'normal',
                 stuck_job_id = NULL
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Physically deletes soft-deleted bots past the retention window, and
    /// any orphaned Result rows left behind once their bot is gone. Returns
    /// `(bots_deleted, results_deleted)`; when `dry_run`, counts only.
    pub async fn purge_retired_bots(
        &self,
        older_than: chrono::DateTime<Utc>,
        dry_run: bool,
    ) -> AppResult<(i64, i64)> {
        if dry_run {
            let (bots,): (i64,) = sqlx::query_as(
                "SELECT count(*) FROM bots WHERE deleted_at IS NOT NULL AND deleted_at < $1",
            )
            .bind(older_than)
            .fetch_one(&self.pool)
            .await?;
            let (results,): (i64,) = sqlx::query_as(
                "SELECT count(*) FROM results r
                 WHERE NOT EXISTS (SELECT 1 FROM bots b WHERE b.id = r.processed_by)",
            )
            .fetch_one(&self.pool)
            .await?;
            return Ok((bots, results));
        }

        let mut tx = self.begin().await?;
        let bots_deleted = sqlx::query(
            "DELETE FROM bots WHERE deleted_at IS NOT NULL AND deleted_at < $1",
        )
        .bind(older_than)
        .execute(&mut *tx)
        .await?
        .rows_affected() as i64;

        let results_deleted = sqlx::query(
            "DELETE FROM results r
             WHERE NOT EXISTS (SELECT 1 FROM bots b WHERE b.id = r.processed_by)",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected() as i64;

        tx.commit().await?;
        Ok((bots_deleted, results_deleted))
    }
}

/// Down/idle/busy/deleted as observed from outside, not the raw stored
/// status, per the derived-field rule in the spec's bot service section.
pub fn computed_bot_status(bot: &Bot, down_threshold: Duration) -> super::models::ComputedStatus {
    use super::models::ComputedStatus;
    if bot.deleted_at.is_some() {
        return ComputedStatus::Deleted;
    }
    let age = Utc::now().signed_duration_since(bot.last_heartbeat_at);
    if age.to_std().map(|a| a > down_threshold).unwrap_or(false) {
        return ComputedStatus::Down;
    }
    match bot.status {
        BotStatus::Idle => ComputedStatus::Idle,
        BotStatus::Busy => ComputedStatus::Busy,
        BotStatus::Down => ComputedStatus::Down,
    }
}

