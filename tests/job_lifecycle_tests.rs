mod common;

use coordinator::store::{JobStatus, Pagination};
use test_context::test_context;

use common::TestHarness;

/// S1 happy path: register, populate, claim, start, complete.
#[test_context(TestHarness)]
#[tokio::test]
async fn happy_path_completes_a_job(ctx: &TestHarness) {
    let bot = ctx.bots.register("b1", None).await.unwrap();
    assert!(bot.assigned_operation.is_none());

    let created = ctx.jobs.create(2, 3, "sum").await.unwrap();
    assert_eq!(created.status, JobStatus::Pending);

    let claimed = ctx.jobs.claim("b1").await.unwrap().expect("job available");
    assert_eq!(claimed.id, created.id);
    assert_eq!(claimed.status, JobStatus::Claimed);

    let bot = ctx.bots.get("b1").await.unwrap();
    assert_eq!(bot.assigned_operation.as_deref(), Some("sum"));
    assert_eq!(bot.current_job_id, Some(claimed.id));

    ctx.jobs.start(claimed.id, "b1").await.unwrap();
    let finished = ctx.jobs.complete(claimed.id, "b1", Some(5), 100).await.unwrap();

    assert_eq!(finished.status, JobStatus::Succeeded);

    let bot = ctx.bots.get("b1").await.unwrap();
    assert!(bot.current_job_id.is_none());
}

/// Invariant 7: a replayed `complete` with identical args succeeds again;
/// conflicting args return Conflict.
#[test_context(TestHarness)]
#[tokio::test]
async fn complete_is_idempotent_on_replay(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(4, 5, "multiply").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();
    ctx.jobs.start(job.id, "b1").await.unwrap();

    ctx.jobs.complete(job.id, "b1", Some(20), 50).await.unwrap();
    // same args again: succeeds
    let replayed = ctx.jobs.complete(job.id, "b1", Some(20), 50).await.unwrap();
    assert_eq!(replayed.status, JobStatus::Succeeded);

    // conflicting args: Conflict, not a silent pass
    let err = ctx.jobs.complete(job.id, "b1", Some(99), 50).await.unwrap_err();
    assert!(err.to_string().contains("terminal"));
}

/// `fail` after `complete` is a conflicting terminal transition.
#[test_context(TestHarness)]
#[tokio::test]
async fn fail_after_complete_is_conflict(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();
    ctx.jobs.start(job.id, "b1").await.unwrap();
    ctx.jobs.complete(job.id, "b1", Some(2), 10).await.unwrap();

    let err = ctx.jobs.fail(job.id, "b1", "boom", 10).await.unwrap_err();
    assert!(format!("{err:?}").contains("Conflict"));
}

/// Invariant 8: releasing an already-pending job is BadRequest, not a no-op.
#[test_context(TestHarness)]
#[tokio::test]
async fn release_of_pending_job_is_bad_request(ctx: &TestHarness) {
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    let err = ctx.jobs.release(job.id, None).await.unwrap_err();
    assert!(format!("{err:?}").contains("BadRequest"));
}

/// `release` on a claimed job clears bindings on both sides and bumps attempts.
#[test_context(TestHarness)]
#[tokio::test]
async fn release_frees_the_bot_and_bumps_attempts(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();

    let released = ctx.jobs.release(job.id, Some("manual")).await.unwrap();
    assert_eq!(released.status, JobStatus::Pending);
    assert!(released.claimed_by.is_none());
    assert_eq!(released.attempts, 1);

    let bot = ctx.bots.get("b1").await.unwrap();
    assert!(bot.current_job_id.is_none());
}

/// Creating a job with an operation not in the registry is rejected.
#[test_context(TestHarness)]
#[tokio::test]
async fn create_rejects_unknown_operation(ctx: &TestHarness) {
    let err = ctx.jobs.create(1, 1, "exponentiate").await.unwrap_err();
    assert!(format!("{err:?}").contains("BadRequest"));
}

/// Listing is ordered by status priority then created_at desc (S6, scaled down).
#[test_context(TestHarness)]
#[tokio::test]
async fn list_orders_pending_before_terminal(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let a = ctx.jobs.create(1, 1, "sum").await.unwrap();
    let b = ctx.jobs.create(2, 2, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap(); // claims `a` (oldest)
    ctx.jobs.start(a.id, "b1").await.unwrap();
    ctx.jobs.complete(a.id, "b1", Some(2), 1).await.unwrap();

    let listed = ctx
        .jobs
        .list(None, Pagination { limit: 10, offset: 0 })
        .await
        .unwrap();

    assert_eq!(listed[0].id, b.id);
    assert_eq!(listed[0].status, JobStatus::Pending);
    assert_eq!(listed[1].id, a.id);
    assert_eq!(listed[1].status, JobStatus::Succeeded);
}
