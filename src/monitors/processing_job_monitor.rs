use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::JobService;

/// Finds jobs stuck in `processing` past the processing timeout and
/// terminal-fails them, since the bot that owned them has gone silent.
pub async fn run(config: Arc<Config>, jobs: JobService, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("processing job monitor shutting down");
                return;
            }
            _ = interval.tick() => {}
        }

        if let Err(err) = run_once(&config, &jobs).await {
            tracing::error!(error = %err, "processing job monitor cycle failed");
        }
    }
}

async fn run_once(config: &Config, jobs: &JobService) -> anyhow::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::from_std(config.processing_job_timeout)?;
    let mut recovered = 0i64;

    while recovered < config.monitor_max_recoveries_per_cycle {
        let batch = jobs
            .find_stuck_processing(cutoff, config.monitor_batch_size)
            .await?;
        if batch.is_empty() {
            break;
        }
        for job in &batch {
            match jobs.force_timeout_fail(job.id, "timeout-in-processing").await {
                Ok(_) => recovered += 1,
                Err(err) => tracing::error!(job_id = %job.id, error = %err, "failed to fail stuck processing job"),
            }
        }
        if (batch.len() as i64) < config.monitor_batch_size {
            break;
        }
    }

    if recovered > 0 {
        tracing::info!(recovered, "processing job monitor recovered stuck jobs");
    }
    Ok(())
}
