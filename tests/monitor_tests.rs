mod common;

use chrono::Utc;
use coordinator::store::JobStatus;
use test_context::test_context;

use common::TestHarness;

/// S4: a job stuck in `claimed` past the timeout is found by the stuck-claim
/// query and released back to `pending`, exactly what the claimed-job
/// monitor does on its own schedule — driven here deterministically instead
/// of waiting on a timer.
#[test_context(TestHarness)]
#[tokio::test]
async fn stuck_claimed_job_is_recovered_to_pending(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();

    backdate(ctx, "claimed_at", job.id, 600).await;

    let cutoff = Utc::now() - chrono::Duration::seconds(300);
    let stuck = ctx.jobs.find_stuck_claimed(cutoff, 10).await.unwrap();
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].id, job.id);

    for j in &stuck {
        ctx.jobs.release(j.id, Some("timeout-in-claimed")).await.unwrap();
    }

    let recovered = ctx.jobs.get(job.id).await.unwrap();
    assert_eq!(recovered.status, JobStatus::Pending);
    assert_eq!(recovered.attempts, 1);

    let bot = ctx.bots.get("b1").await.unwrap();
    assert!(bot.current_job_id.is_none());
}

/// A claimed job still within the timeout window is not flagged stuck.
#[test_context(TestHarness)]
#[tokio::test]
async fn fresh_claimed_job_is_not_stuck(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();

    let cutoff = Utc::now() - chrono::Duration::seconds(300);
    let stuck = ctx.jobs.find_stuck_claimed(cutoff, 10).await.unwrap();
    assert!(stuck.is_empty());
}

/// S5: a job stuck in `processing` past the timeout is terminal-failed
/// directly, without requiring the owning bot to call back in.
#[test_context(TestHarness)]
#[tokio::test]
async fn stuck_processing_job_is_force_failed(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();
    ctx.jobs.start(job.id, "b1").await.unwrap();

    backdate(ctx, "started_at", job.id, 900).await;

    let cutoff = Utc::now() - chrono::Duration::seconds(600);
    let stuck = ctx.jobs.find_stuck_processing(cutoff, 10).await.unwrap();
    assert_eq!(stuck.len(), 1);

    for j in &stuck {
        let outcome = ctx
            .jobs
            .force_timeout_fail(j.id, "timeout-in-processing")
            .await
            .unwrap();
        assert!(outcome.is_some());
    }

    let failed = ctx.jobs.get(job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("timeout-in-processing"));
}

/// Force-failing a job that already finished on its own is a no-op, not an
/// error — the bot may have completed it in the gap before the monitor ran.
#[test_context(TestHarness)]
#[tokio::test]
async fn force_fail_is_a_noop_once_job_already_finished(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();
    ctx.jobs.start(job.id, "b1").await.unwrap();
    ctx.jobs.complete(job.id, "b1", Some(2), 5).await.unwrap();

    let outcome = ctx
        .jobs
        .force_timeout_fail(job.id, "timeout-in-processing")
        .await
        .unwrap();
    assert!(outcome.is_none());

    let job = ctx.jobs.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
}

/// Cleanup purges bots soft-deleted before the retention cutoff and leaves
/// recently-deleted ones alone.
#[test_context(TestHarness)]
#[tokio::test]
async fn retention_cleanup_purges_only_old_soft_deletes(ctx: &TestHarness) {
    ctx.bots.register("stale", None).await.unwrap();
    ctx.bots.register("recent", None).await.unwrap();
    ctx.bots.soft_delete("stale").await.unwrap();
    ctx.bots.soft_delete("recent").await.unwrap();

    sqlx::query("UPDATE bots SET deleted_at = now() - interval '30 days' WHERE id = 'stale'")
        .execute(ctx.store.pool())
        .await
        .unwrap();

    let cutoff = Utc::now() - chrono::Duration::days(7);
    let (bots_deleted, _results_deleted) = ctx.bots.purge_retired(cutoff, false).await.unwrap();
    assert_eq!(bots_deleted, 1);

    assert!(ctx.bots.get("stale").await.is_err());
    assert!(ctx.bots.get("recent").await.is_ok());
}

async fn backdate(ctx: &TestHarness, column: &str, job_id: uuid::Uuid, seconds_ago: i64) {
    let sql = format!("UPDATE jobs SET {column} = now() - interval '{seconds_ago} seconds' WHERE id = $1");
    sqlx::query(&sql)
        .bind(job_id)
        .execute(ctx.store.pool())
        .await
        .unwrap();
}
