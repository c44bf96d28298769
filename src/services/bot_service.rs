use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::store::postgres::computed_bot_status;
use crate::store::{Bot, ComputedStatus, Store};

/// Bot identity, liveness, and assignment. A bot's `computed_status` is
/// always derived fresh from `last_heartbeat_at` and `deleted_at`; the
/// stored `status` column only tracks idle/busy.
#[derive(Clone)]
pub struct BotService {
    store: Store,
    down_threshold: Duration,
}

impl BotService {
    pub fn new(store: Store, down_threshold: Duration) -> Self {
        Self {
            store,
            down_threshold,
        }
    }

    /// Idempotent on id: reviving a soft-deleted bot preserves its existing
    /// `assigned_operation` unless the caller supplies a new one.
    pub async fn register(&self, id: &str, assigned_operation: Option<&str>) -> AppResult<Bot> {
        if id.trim().is_empty() {
            return Err(AppError::BadRequest("bot id must not be empty".to_string()));
        }
        let bot = self.store.register_bot(id, assigned_operation).await?;
        tracing::info!(bot_id = %bot.id, "bot registered");
        Ok(bot)
    }

    pub async fn heartbeat(&self, id: &str) -> AppResult<Bot> {
        self.store.heartbeat_bot(id).await
    }

    pub async fn assign_operation(&self, id: &str, operation: Option<&str>) -> AppResult<Bot> {
        let bot = self.store.assign_operation(id, operation).await?;
        tracing::info!(bot_id = %bot.id, operation, "bot operation pin updated");
        Ok(bot)
    }

    /// If the bot holds a job, that job is released first so nothing is
    /// orphaned on a dead worker.
    pub async fn soft_delete(&self, id: &str) -> AppResult<()> {
        self.store.soft_delete_bot(id).await?;
        tracing::info!(bot_id = id, "bot soft-deleted");
        Ok(())
    }

    pub async fn reset(&self, id: &str) -> AppResult<Bot> {
        let bot = self.store.reset_bot(id).await?;
        tracing::warn!(bot_id = %bot.id, "bot reset");
        Ok(bot)
    }

    pub async fn get(&self, id: &str) -> AppResult<Bot> {
        self.store.get_bot(id).await?.ok_or(AppError::NotFound("bot"))
    }

    pub async fn list(&self, include_deleted: bool) -> AppResult<Vec<(Bot, ComputedStatus)>> {
        let bots = self.store.list_bots(include_deleted).await?;
        Ok(bots
            .into_iter()
            .map(|b| {
                let status = computed_bot_status(&b, self.down_threshold);
                (b, status)
            })
            .collect())
    }

    /// Physically deletes bots soft-deleted before `older_than`, plus any
    /// Result rows left orphaned once their bot is gone. `dry_run` reports
    /// counts without deleting.
    pub async fn purge_retired(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
        dry_run: bool,
    ) -> AppResult<(i64, i64)> {
        self.store.purge_retired_bots(older_than, dry_run).await
    }
}
