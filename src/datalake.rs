use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::store::ResultRecord;

const SCHEMA_VERSION: u32 = 1;

/// The append-only archive interface spec.md §4.6 calls for. The coordinator
/// depends on this trait, not on [`NdjsonDatalake`] directly, so a future
/// reconciler or alternate sink (S3, Kafka) can be swapped in without
/// touching the services that call it.
#[async_trait]
pub trait Datalake: Send + Sync {
    /// Appends `result`. Never propagates a failure: implementations log and
    /// return `false` so the caller can count it, but the owning job
    /// transition must not roll back on a sink failure.
    async fn append(&self, result: &ResultRecord) -> bool;
}

#[derive(Serialize)]
struct DatalakeRecord<'a> {
    id: uuid::Uuid,
    job_id: uuid::Uuid,
    a: i64,
    b: i64,
    operation: &'a str,
    result: Option<i64>,
    processed_by: &'a str,
    processed_at: chrono::DateTime<Utc>,
    duration_ms: i64,
    status: &'a str,
    error: Option<&'a str>,
    schema_version: u32,
}

/// Append-only, date-partitioned NDJSON sink for terminal Result records.
/// Fire-and-forget: a write failure is logged and counted, never
/// propagated, so a stuck filesystem can't wedge job completion. The
/// database Result row remains the authoritative record.
pub struct NdjsonDatalake {
    dir: PathBuf,
    // Serializes appends so concurrent completions don't interleave partial
    // lines within the same day's file.
    lock: Mutex<()>,
}

impl NdjsonDatalake {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    async fn try_append(&self, result: &ResultRecord) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let date = Utc::now().format("%Y-%m-%d");
        let path = self.dir.join(format!("results-{date}.ndjson"));

        let status = match result.status {
            crate::store::ResultStatus::Succeeded => "succeeded",
            crate::store::ResultStatus::Failed => "failed",
        };
        let record = DatalakeRecord {
            id: result.id,
            job_id: result.job_id,
            a: result.a,
            b: result.b,
            operation: &result.operation,
            result: result.result,
            processed_by: &result.processed_by,
            processed_at: result.processed_at,
            duration_ms: result.duration_ms,
            status,
            error: result.error.as_deref(),
            schema_version: SCHEMA_VERSION,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl Datalake for NdjsonDatalake {
    /// Appends `result` to today's file. Never returns an error to the
    /// caller; failures are logged and should be tallied via the `false`
    /// return value so callers can increment a counter if they want one.
    async fn append(&self, result: &ResultRecord) -> bool {
        if let Err(err) = self.try_append(result).await {
            tracing::error!(error = %err, job_id = %result.job_id, "datalake append failed");
            return false;
        }
        true
    }
}
