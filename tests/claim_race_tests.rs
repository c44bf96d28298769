mod common;

use std::collections::HashSet;

use coordinator::store::JobStatus;
use test_context::test_context;

use common::TestHarness;

/// S2 / invariant 9: when N bots race for one pending job, exactly one
/// claim succeeds and the rest see no job available.
#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_claims_assign_exactly_once(ctx: &TestHarness) {
    for i in 0..8 {
        ctx.bots.register(&format!("racer-{i}"), None).await.unwrap();
    }
    ctx.jobs.create(1, 1, "sum").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let jobs = ctx.jobs.clone();
        handles.push(tokio::spawn(async move { jobs.claim(&format!("racer-{i}")).await }));
    }

    let mut winners = 0;
    for h in handles {
        if h.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

/// S3: once a bot's assignment is pinned, `claim` only ever hands it jobs
/// of that operation, even when other operations are queued ahead of it.
#[test_context(TestHarness)]
#[tokio::test]
async fn claim_respects_operation_pin(ctx: &TestHarness) {
    ctx.bots.register("pinned", Some("divide")).await.unwrap();

    let sum_job = ctx.jobs.create(10, 2, "sum").await.unwrap();
    let divide_job = ctx.jobs.create(10, 2, "divide").await.unwrap();

    let claimed = ctx.jobs.claim("pinned").await.unwrap().expect("a job");
    assert_eq!(claimed.id, divide_job.id);
    assert_ne!(claimed.id, sum_job.id);

    let bot = ctx.bots.get("pinned").await.unwrap();
    assert_eq!(bot.assigned_operation.as_deref(), Some("divide"));
}

/// An unassigned bot's first claim pins its operation for future claims.
#[test_context(TestHarness)]
#[tokio::test]
async fn first_claim_pins_an_unassigned_bot(ctx: &TestHarness) {
    ctx.bots.register("floater", None).await.unwrap();
    ctx.jobs.create(1, 1, "multiply").await.unwrap();

    let claimed = ctx.jobs.claim("floater").await.unwrap().unwrap();
    assert_eq!(claimed.operation, "multiply");

    let bot = ctx.bots.get("floater").await.unwrap();
    assert_eq!(bot.assigned_operation.as_deref(), Some("multiply"));
}

/// A bot that already holds a job cannot claim a second one.
#[test_context(TestHarness)]
#[tokio::test]
async fn claim_rejects_a_bot_that_already_holds_a_job(ctx: &TestHarness) {
    ctx.bots.register("busy", None).await.unwrap();
    ctx.jobs.create(1, 1, "sum").await.unwrap();
    ctx.jobs.create(2, 2, "sum").await.unwrap();

    ctx.jobs.claim("busy").await.unwrap().unwrap();
    let err = ctx.jobs.claim("busy").await.unwrap_err();
    assert!(format!("{err:?}").contains("Conflict"));
}

/// Claiming with no matching pending job returns `Ok(None)`, not an error.
#[test_context(TestHarness)]
#[tokio::test]
async fn claim_with_nothing_pending_returns_none(ctx: &TestHarness) {
    ctx.bots.register("idle", None).await.unwrap();
    assert!(ctx.jobs.claim("idle").await.unwrap().is_none());
}

/// FIFO within an operation: the oldest pending job of a matching operation
/// is claimed first.
#[test_context(TestHarness)]
#[tokio::test]
async fn claim_picks_oldest_first(ctx: &TestHarness) {
    ctx.bots.register("b1", None).await.unwrap();
    let first = ctx.jobs.create(1, 1, "sum").await.unwrap();
    let _second = ctx.jobs.create(2, 2, "sum").await.unwrap();

    let claimed = ctx.jobs.claim("b1").await.unwrap().unwrap();
    assert_eq!(claimed.id, first.id);
}

/// Every claimed job ends up claimed by exactly one bot id; no double
/// assignment slips through a pinned-operation race either.
#[test_context(TestHarness)]
#[tokio::test]
async fn pinned_race_also_assigns_exactly_once(ctx: &TestHarness) {
    for i in 0..5 {
        ctx.bots.register(&format!("pinned-{i}"), Some("sum")).await.unwrap();
    }
    ctx.jobs.create(3, 4, "sum").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let jobs = ctx.jobs.clone();
        handles.push(tokio::spawn(async move { jobs.claim(&format!("pinned-{i}")).await }));
    }

    let mut claimers = HashSet::new();
    for h in handles {
        if let Some(job) = h.await.unwrap().unwrap() {
            assert_eq!(job.status, JobStatus::Claimed);
            claimers.insert(job.claimed_by.clone());
        }
    }
    assert_eq!(claimers.len(), 1);
}
