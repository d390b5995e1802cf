//! Lock behavior of the cleanup runner: mutual exclusion, stale-lock
//! takeover, and release on the error path.

mod common;

use common::TestEnv;
use tessera_metadata::models::LockRow;
use tessera_metadata::repos::{AuditRepo, CanvasRepo, LockRepo};
use time::{Duration, OffsetDateTime};

#[tokio::test]
async fn run_is_skipped_while_another_holds_the_lock() {
    let env = TestEnv::new().await;
    env.insert_canvas(40, 0, false).await;

    env.metadata
        .try_insert_lock(&LockRow {
            lock_id: 1,
            holder: "other-runner".to_string(),
            held_at: OffsetDateTime::now_utc(),
        })
        .await
        .unwrap();

    let err = env.runner().execute().await.unwrap_err();
    assert!(err.is_lock_held());
    assert!(err.to_string().contains("other-runner"));

    // Nothing was deleted, no audit record was written, and the other
    // runner's lock is untouched.
    assert_eq!(env.metadata.count_canvases().await.unwrap(), 1);
    assert!(
        env.metadata
            .list_recent_audit_records(10)
            .await
            .unwrap()
            .is_empty()
    );
    let held = env.metadata.get_lock().await.unwrap().unwrap();
    assert_eq!(held.holder, "other-runner");
}

#[tokio::test]
async fn concurrent_runs_admit_exactly_one() {
    let env = TestEnv::new().await;
    env.insert_canvas(40, 0, false).await;

    // Both runners try to insert the lock row before either can have
    // reached its release, so exactly one acquires it.
    let a = env.runner().with_holder("runner-a");
    let b = env.runner().with_holder("runner-b");
    let outcome = tokio::join!(a.execute(), b.execute());

    let (winner, loser) = match outcome {
        (Ok(result), Err(e)) => (result, e),
        (Err(e), Ok(result)) => (result, e),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(winner.success);
    assert!(loser.is_lock_held());
    // The loser learns who beat it.
    assert!(loser.to_string().contains("runner-"));

    // The winner completed the run and released the lock.
    assert_eq!(env.metadata.count_canvases().await.unwrap(), 0);
    assert!(env.metadata.get_lock().await.unwrap().is_none());
}

#[tokio::test]
async fn stale_lock_is_taken_over() {
    let env = TestEnv::new().await;
    let canvas = env.insert_canvas(40, 0, false).await;

    // A lock left behind by a crashed run, well past the threshold.
    env.metadata
        .try_insert_lock(&LockRow {
            lock_id: 1,
            holder: "crashed-runner".to_string(),
            held_at: OffsetDateTime::now_utc() - Duration::minutes(45),
        })
        .await
        .unwrap();

    let result = env.runner().execute().await.unwrap();
    assert!(result.success);
    assert!(
        env.metadata
            .get_canvas(canvas.canvas_id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(env.metadata.get_lock().await.unwrap().is_none());
}

#[tokio::test]
async fn lock_is_released_when_the_run_aborts() {
    let env = TestEnv::new().await;

    // Break the store out from under the runner so the first metadata
    // query of the run fails.
    sqlx::query("DROP TABLE tiles")
        .execute(env.metadata.pool())
        .await
        .unwrap();

    let err = env.runner().execute().await.unwrap_err();
    assert!(!err.is_lock_held());

    // The aborted run wrote no audit record but did release the lock.
    assert!(env.metadata.get_lock().await.unwrap().is_none());
    assert!(
        env.metadata
            .list_recent_audit_records(10)
            .await
            .unwrap()
            .is_empty()
    );
}
