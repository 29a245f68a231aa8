//! Scheduler tick decisions

use chrono::{Duration, Utc};

use gallerysync_core::domain::{RunStatus, VersionMarker};
use gallerysync_sync::{RunBudget, TickOutcome};

use crate::common::{album_id, Harness};

#[tokio::test]
async fn test_first_tick_syncs_without_detection() {
    let h = Harness::with_two_albums().await;

    let outcome = h.scheduler().tick(&RunBudget::unlimited()).await.unwrap();
    match outcome {
        TickOutcome::Synced { report, result } => {
            assert!(report.is_none());
            assert_eq!(result.status, RunStatus::Complete);
            assert_eq!(result.items_uploaded, 5);
        }
        other => panic!("expected a sync, got {other:?}"),
    }
}

#[tokio::test]
async fn test_quiet_tick_sends_heartbeat() {
    let h = Harness::with_two_albums().await;
    let scheduler = h.scheduler();
    scheduler.tick(&RunBudget::unlimited()).await.unwrap();
    let marker: VersionMarker = h.blob.json("metadata/version.json");
    let version = marker.get(scheduler.engine().collection()).unwrap().version;

    let outcome = scheduler.tick(&RunBudget::unlimited()).await.unwrap();
    match outcome {
        TickOutcome::Heartbeat { report, entry } => {
            assert!(!report.has_changes);
            assert_eq!(entry.version, version);
        }
        other => panic!("expected a heartbeat, got {other:?}"),
    }

    let again = scheduler.tick(&RunBudget::unlimited()).await.unwrap();
    assert!(again.run_result().is_none());
}

#[tokio::test]
async fn test_change_triggers_a_new_generation() {
    let h = Harness::with_two_albums().await;
    let scheduler = h.scheduler();
    scheduler.tick(&RunBudget::unlimited()).await.unwrap();

    h.source.add_item("B", "B3", Utc::now() + Duration::hours(1));
    let outcome = scheduler.tick(&RunBudget::unlimited()).await.unwrap();
    match outcome {
        TickOutcome::Synced { report, result } => {
            let report = report.unwrap();
            assert_eq!(report.changed_album_ids, vec![album_id("B")]);
            assert_eq!(result.items_uploaded, 1);
            assert_eq!(result.items_skipped, 5);
        }
        other => panic!("expected a sync, got {other:?}"),
    }
}

#[tokio::test]
async fn test_paused_generation_is_resumed() {
    let h = Harness::with_two_albums().await;
    let scheduler = h.scheduler();

    let first = scheduler
        .tick(&RunBudget::unlimited().with_max_items(2))
        .await
        .unwrap();
    assert_eq!(first.run_result().unwrap().status, RunStatus::Paused);

    let second = scheduler.tick(&RunBudget::unlimited()).await.unwrap();
    match second {
        TickOutcome::Resumed(result) => {
            assert_eq!(result.status, RunStatus::Complete);
            assert_eq!(result.items_processed, 3);
        }
        other => panic!("expected a resume, got {other:?}"),
    }
}

#[tokio::test]
async fn test_detection_failure_is_counted() {
    let h = Harness::with_two_albums().await;
    let scheduler = h.scheduler();
    scheduler.tick(&RunBudget::unlimited()).await.unwrap();

    h.source.set_unauthorized(true);
    assert!(scheduler.tick(&RunBudget::unlimited()).await.is_err());
    let failures = scheduler.engine().failure_tracker().state().await.unwrap();
    assert_eq!(failures.consecutive_failures, 1);

    h.source.set_unauthorized(false);
    scheduler.tick(&RunBudget::unlimited()).await.unwrap();
    assert!(scheduler
        .engine()
        .failure_tracker()
        .state()
        .await
        .unwrap()
        .is_clear());
}
