use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::JobService;

/// Creates a batch of jobs on a fixed interval. Ad-hoc admin-triggered
/// populate calls `JobService::populate` directly and share this same code
/// path; this loop is just a scheduled caller.
pub async fn run(config: Arc<Config>, jobs: JobService, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(config.populate_interval);
    interval.tick().await; // first tick fires immediately; skip it, populate on the following tick

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("populator shutting down");
                return;
            }
            _ = interval.tick() => {}
        }

        match jobs
            .populate(config.populate_batch_size, None, config.max_pending_jobs)
            .await
        {
            Ok(created) => tracing::info!(count = created.len(), "populator cycle complete"),
            Err(err) => tracing::error!(error = %err, "populator cycle failed"),
        }
    }
}
