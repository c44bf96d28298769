pub mod claimed_job_monitor;
pub mod populator;
pub mod processing_job_monitor;
pub mod retention_cleaner;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use retention_cleaner::{CleanupReport, RetentionCleaner};

use crate::config::Config;
use crate::services::{BotService, JobService};

/// Spawns the four independent monitor loops and returns a handle that, on
/// drop or explicit cancellation, signals all of them to stop. Each loop
/// catches and logs its own errors and never takes a process-wide lock;
/// they are just scheduled callers of the services above.
pub struct Monitors {
    pub shutdown: CancellationToken,
    pub retention_cleaner: Arc<RetentionCleaner>,
}

pub fn spawn(config: Arc<Config>, jobs: JobService, bots: BotService) -> Monitors {
    let shutdown = CancellationToken::new();
    let retention_cleaner = Arc::new(RetentionCleaner::new());

    tokio::spawn(populator::run(
        config.clone(),
        jobs.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(claimed_job_monitor::run(
        config.clone(),
        jobs.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(processing_job_monitor::run(
        config.clone(),
        jobs.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(retention_cleaner::run(
        config,
        bots,
        retention_cleaner.clone(),
        shutdown.clone(),
    ));

    Monitors {
        shutdown,
        retention_cleaner,
    }
}
