use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_port: u16,
    pub admin_token: String,
    pub datalake_dir: String,
    pub operations_dir: String,

    pub populate_interval: Duration,
    pub populate_batch_size: i64,
    pub max_pending_jobs: i64,

    pub claimed_job_timeout: Duration,
    pub processing_job_timeout: Duration,
    pub bot_down_threshold: Duration,
    pub bot_retention: Duration,
    pub cleanup_interval: Duration,

    pub monitor_max_recoveries_per_cycle: i64,
    pub monitor_batch_size: i64,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{name} is not valid: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables, failing fast on anything malformed.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let admin_token = env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?;
        let datalake_dir = env_or("DATALAKE_DIR", "./datalake");
        let operations_dir = env_or("OPERATIONS_DIR", "./operations");

        let http_port: u16 = parse_env("HTTP_PORT", 8080u16).context("HTTP_PORT")?;

        let populate_interval_ms: u64 =
            parse_env("POPULATE_INTERVAL_MS", 600_000u64).context("POPULATE_INTERVAL_MS")?;
        let populate_batch_size: i64 = parse_env("BATCH_SIZE", 5i64).context("BATCH_SIZE")?;
        let max_pending_jobs: i64 =
            parse_env("MAX_PENDING_JOBS", 10_000i64).context("MAX_PENDING_JOBS")?;

        let claimed_job_timeout_s: u64 = parse_env("CLAIMED_JOB_TIMEOUT_SECONDS", 300u64)
            .context("CLAIMED_JOB_TIMEOUT_SECONDS")?;
        let processing_job_timeout_s: u64 = parse_env("PROCESSING_JOB_TIMEOUT_SECONDS", 600u64)
            .context("PROCESSING_JOB_TIMEOUT_SECONDS")?;
        let bot_down_threshold_s: u64 = parse_env("BOT_DOWN_THRESHOLD_SECONDS", 120u64)
            .context("BOT_DOWN_THRESHOLD_SECONDS")?;
        let bot_retention_days: u64 =
            parse_env("BOT_RETENTION_DAYS", 7u64).context("BOT_RETENTION_DAYS")?;
        let cleanup_interval_hours: u64 =
            parse_env("CLEANUP_INTERVAL_HOURS", 6u64).context("CLEANUP_INTERVAL_HOURS")?;

        let monitor_max_recoveries_per_cycle: i64 =
            parse_env("MONITOR_MAX_RECOVERIES_PER_CYCLE", 100i64)
                .context("MONITOR_MAX_RECOVERIES_PER_CYCLE")?;
        let monitor_batch_size: i64 =
            parse_env("MONITOR_BATCH_SIZE", 10i64).context("MONITOR_BATCH_SIZE")?;

        Ok(Self {
            database_url,
            http_port,
            admin_token,
            datalake_dir,
            operations_dir,
            populate_interval: Duration::from_millis(populate_interval_ms),
            populate_batch_size,
            max_pending_jobs,
            claimed_job_timeout: Duration::from_secs(claimed_job_timeout_s),
            processing_job_timeout: Duration::from_secs(processing_job_timeout_s),
            bot_down_threshold: Duration::from_secs(bot_down_threshold_s),
            bot_retention: Duration::from_secs(bot_retention_days * 86_400),
            cleanup_interval: Duration::from_secs(cleanup_interval_hours * 3_600),
            monitor_max_recoveries_per_cycle,
            monitor_batch_size,
        })
    }
}
