use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::BotService;

const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub ran_at: DateTime<Utc>,
    pub dry_run: bool,
    pub bots_deleted: i64,
    pub results_deleted: i64,
}

/// Bounded in-memory history of recent cleanup runs, queryable via the
/// admin API without hitting the store again.
#[derive(Default)]
pub struct RetentionCleaner {
    history: Mutex<VecDeque<CleanupReport>>,
}

impl RetentionCleaner {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    pub async fn history(&self) -> Vec<CleanupReport> {
        self.history.lock().await.iter().cloned().collect()
    }

    async fn record(&self, report: CleanupReport) {
        let mut history = self.history.lock().await;
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(report);
    }

    /// Runs one cleanup pass and records it in the bounded history.
    pub async fn run_once(
        &self,
        config: &Config,
        bots: &BotService,
        dry_run: bool,
    ) -> anyhow::Result<CleanupReport> {
        let cutoff = Utc::now() - chrono::Duration::from_std(config.bot_retention)?;
        let (bots_deleted, results_deleted) = bots.purge_retired(cutoff, dry_run).await?;
        let report = CleanupReport {
            ran_at: Utc::now(),
            dry_run,
            bots_deleted,
            results_deleted,
        };
        self.record(report.clone()).await;
        Ok(report)
    }
}

pub async fn run(
    config: Arc<Config>,
    bots: BotService,
    cleaner: Arc<RetentionCleaner>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.cleanup_interval);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("retention cleaner shutting down");
                return;
            }
            _ = interval.tick() => {}
        }

        match cleaner.run_once(&config, &bots, false).await {
            Ok(report) => tracing::info!(
                bots_deleted = report.bots_deleted,
                results_deleted = report.results_deleted,
                "retention cleanup complete"
            ),
            Err(err) => tracing::error!(error = %err, "retention cleanup failed"),
        }
    }
}
