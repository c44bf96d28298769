mod common;

use coordinator::store::ComputedStatus;
use test_context::test_context;

use common::TestHarness;

/// Invariant 6: registering the same bot id twice does not create a second
/// row, and a subsequent call with no operation preserves the one already set.
#[test_context(TestHarness)]
#[tokio::test]
async fn register_is_idempotent_and_preserves_assignment(ctx: &TestHarness) {
    let first = ctx.bots.register("b1", Some("sum")).await.unwrap();
    assert_eq!(first.assigned_operation.as_deref(), Some("sum"));

    let second = ctx.bots.register("b1", None).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.assigned_operation.as_deref(), Some("sum"));
}

/// Re-registering a soft-deleted bot revives it rather than erroring.
#[test_context(TestHarness)]
#[tokio::test]
async fn register_revives_a_soft_deleted_bot(ctx: &TestHarness) {
    ctx.bots.register("b1", Some("sum")).await.unwrap();
    ctx.bots.soft_delete("b1").await.unwrap();

    let revived = ctx.bots.register("b1", None).await.unwrap();
    assert!(revived.deleted_at.is_none());
    assert_eq!(revived.assigned_operation.as_deref(), Some("sum"));
}

/// Soft-deleting a bot holding a claimed job releases that job back to
/// `pending` instead of leaving it orphaned.
#[test_context(TestHarness)]
#[tokio::test]
async fn soft_delete_releases_the_held_job(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let job = ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();

    ctx.bots.soft_delete("b1").await.unwrap();

    let reloaded = ctx.jobs.get(job.id).await.unwrap();
    assert_eq!(reloaded.status, coordinator::store::JobStatus::Pending);
    assert!(reloaded.claimed_by.is_none());
}

/// Reset clears a bot's binding and health flags regardless of the held
/// job's status, without touching the job's terminal history.
#[test_context(TestHarness)]
#[tokio::test]
async fn reset_clears_binding_and_releases_job(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.claim("b1").await.unwrap().unwrap();

    let reset = ctx.bots.reset("b1").await.unwrap();
    assert!(reset.current_job_id.is_none());

    let bot = ctx.bots.get("b1").await.unwrap();
    assert!(bot.current_job_id.is_none());
}

/// A bot that hasn't heartbeat recently is reported down even though its
/// stored status column still says idle/busy.
#[test_context(TestHarness)]
#[tokio::test]
async fn computed_status_reports_down_after_stale_heartbeat(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    sqlx::query("UPDATE bots SET last_heartbeat_at = now() - interval '10 minutes' WHERE id = 'b1'")
        .execute(ctx.store.pool())
        .await
        .unwrap();

    let listed = ctx.bots.list(false).await.unwrap();
    let (_, status) = listed.iter().find(|(b, _)| b.id == "b1").unwrap();
    assert_eq!(*status, ComputedStatus::Down);
}

/// Heartbeat on an unknown bot id is NotFound, not a silent upsert.
#[test_context(TestHarness)]
#[tokio::test]
async fn heartbeat_on_unknown_bot_is_not_found(ctx: &TestHarness) {
    let err = ctx.bots.heartbeat("ghost").await.unwrap_err();
    assert!(format!("{err:?}").contains("NotFound"));
}

/// An empty bot id is rejected before it ever reaches the store.
#[test_context(TestHarness)]
#[tokio::test]
async fn register_rejects_empty_id(ctx: &TestHarness) {
    let err = ctx.bots.register("  ", None).await.unwrap_err();
    assert!(format!("{err:?}").contains("BadRequest"));
}
