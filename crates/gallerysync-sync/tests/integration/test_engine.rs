//! SyncEngine behavior against in-memory adapters

use std::sync::Arc;
use std::time::Duration;

use gallerysync_core::domain::{AlbumManifest, GalleryManifest, RunLog, RunStatus, VersionMarker};
use gallerysync_core::ports::ICheckpointStore;
use gallerysync_sync::{RunBudget, SyncEngine, SyncError};

use crate::common::{album_id, test_config, Harness, LeaseLosingStore};

fn items(n: u64) -> RunBudget {
    RunBudget::unlimited().with_max_items(n)
}

// ============================================================================
// Budget and resume
// ============================================================================

#[tokio::test]
async fn test_budget_pause_at_album_boundary_then_complete() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    let first = engine.run_sync(&items(3)).await.unwrap();
    assert_eq!(first.status, RunStatus::Paused);
    assert_eq!(
        (first.items_processed, first.items_uploaded, first.items_skipped),
        (3, 3, 0)
    );

    let checkpoint = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.album_index, 1);
    assert_eq!(checkpoint.item_index, 0);
    assert_eq!(checkpoint.run_status, RunStatus::Paused);
    // Album A's manifest went out with the item step that finished it
    let manifest_a: AlbumManifest = h.blob.json("gallery/albums/A.json");
    assert_eq!(manifest_a.items.len(), 3);
    assert!(manifest_a.items.iter().all(|i| i.complete));

    let second = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(second.status, RunStatus::Complete);
    assert_eq!(
        (second.items_processed, second.items_uploaded, second.items_skipped),
        (2, 2, 0)
    );

    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    assert_eq!(gallery.item_count(), 5);
    assert!(engine.state().load_checkpoint().await.unwrap().is_none());
}

#[tokio::test]
async fn test_pause_mid_album_resumes_at_exact_item() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    let first = engine.run_sync(&items(2)).await.unwrap();
    assert_eq!(first.status, RunStatus::Paused);

    let checkpoint = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!((checkpoint.album_index, checkpoint.item_index), (0, 2));
    assert!(!h.blob.contains("gallery/albums/A.json"));

    let second = engine.run_sync(&items(1)).await.unwrap();
    assert_eq!(second.items_uploaded, 1);
    assert_eq!(h.source.fetch_count("A1"), 2);
    assert_eq!(h.source.fetch_count("A3"), 2);
    assert!(h.blob.contains("gallery/albums/A.json"));
}

#[tokio::test]
async fn test_interrupted_runs_add_up_to_one_unlimited_run() {
    let reference = Harness::with_two_albums().await;
    let full = reference
        .engine()
        .run_sync(&RunBudget::unlimited())
        .await
        .unwrap();

    let h = Harness::with_two_albums().await;
    let engine = h.engine();
    let mut processed = 0;
    let mut uploaded = 0;
    let mut runs = 0;
    loop {
        let result = engine.run_sync(&items(1)).await.unwrap();
        processed += result.items_processed;
        uploaded += result.items_uploaded;
        runs += 1;
        if result.status != RunStatus::Paused {
            break;
        }
        assert!(runs < 20, "generation never finished");
    }

    assert_eq!(processed, full.items_processed);
    assert_eq!(uploaded, full.items_uploaded);
    assert_eq!(h.blob.image_puts(), reference.blob.image_puts());
}

#[tokio::test]
async fn test_zero_budget_persists_checkpoint_without_work() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    let result = engine.run_sync(&RunBudget::new(Duration::ZERO)).await.unwrap();
    assert_eq!(result.status, RunStatus::Paused);
    assert_eq!(result.items_processed, 0);

    let checkpoint = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.albums.len(), 2);
    assert_eq!((checkpoint.album_index, checkpoint.item_index), (0, 0));
    assert_eq!(h.source.total_fetches(), 0);
}

// ============================================================================
// Enumeration order
// ============================================================================

fn published_order(h: &Harness) -> Vec<(String, Vec<String>)> {
    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    gallery
        .albums
        .iter()
        .map(|summary| {
            let manifest: AlbumManifest =
                h.blob.json(&format!("gallery/albums/{}.json", summary.id));
            let items = manifest.items.iter().map(|i| i.id.to_string()).collect();
            (summary.id.to_string(), items)
        })
        .collect()
}

#[tokio::test]
async fn test_unchanged_source_enumerates_in_the_same_order() {
    let h = Harness::with_two_albums().await;
    h.source.add_album("C", 2);
    let engine = h.engine();

    engine.run_sync(&RunBudget::new(Duration::ZERO)).await.unwrap();
    let first = engine.state().load_checkpoint().await.unwrap().unwrap();
    engine.state().clear_checkpoint().await.unwrap();
    engine.run_sync(&RunBudget::new(Duration::ZERO)).await.unwrap();
    let second = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(first.albums, second.albums);

    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    let before = published_order(&h);
    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(published_order(&h), before);
    assert_eq!(
        before.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
        vec!["A", "B", "C"]
    );
    assert_eq!(before[0].1, vec!["A1", "A2", "A3"]);
}

#[tokio::test]
async fn test_resume_walks_the_snapshot_taken_at_generation_start() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    engine.run_sync(&items(3)).await.unwrap();
    let checkpoint = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!((checkpoint.album_index, checkpoint.item_index), (1, 0));

    // The source changes between runs: a new album, listed first
    h.source.add_album("C", 1);
    h.source.reverse_albums();

    let resumed = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(resumed.status, RunStatus::Complete);
    assert_eq!(resumed.items_processed, 2);
    assert_eq!(h.source.fetch_count("C1"), 0);
    assert!(!h.blob.contains("gallery/albums/C.json"));
    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    let album_ids: Vec<&str> = gallery.albums.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(album_ids, vec!["A", "B"]);

    // The next generation takes a fresh snapshot
    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    let album_ids: Vec<&str> = gallery.albums.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(album_ids, vec!["C", "B", "A"]);
}

// ============================================================================
// Idempotence and completeness
// ============================================================================

#[tokio::test]
async fn test_second_run_uploads_nothing() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    let puts = h.blob.image_puts();
    let fetches = h.source.total_fetches();

    let again = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(again.status, RunStatus::Complete);
    assert_eq!(again.items_uploaded, 0);
    assert_eq!(again.items_skipped, 5);
    assert_eq!(h.blob.image_puts(), puts);
    assert_eq!(h.source.total_fetches(), fetches);
}

#[tokio::test]
async fn test_complete_generation_publishes_every_item() {
    let h = Harness::with_two_albums().await;
    h.engine().run_sync(&RunBudget::unlimited()).await.unwrap();

    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    let album_ids: Vec<&str> = gallery.albums.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(album_ids, vec!["A", "B"]);

    let mut published = Vec::new();
    for summary in &gallery.albums {
        let manifest: AlbumManifest = h.blob.json(&format!("gallery/albums/{}.json", summary.id));
        assert_eq!(manifest.items.len(), summary.item_count);
        for item in &manifest.items {
            assert!(item.complete, "{} incomplete", item.id);
            assert_eq!(
                item.urls.get("400").map(String::as_str),
                Some(format!("https://cdn.test/images/{}-400.jpg", item.id).as_str())
            );
            assert!(item.urls.contains_key("original"));
            published.push(item.id.to_string());
        }
        assert!(summary.cover.is_some());
    }
    assert_eq!(published, h.source.item_ids());

    let thumb = h.blob.object("images/A1-400.jpg").unwrap();
    assert_eq!(thumb.content_type, "image/jpeg");
    assert!(thumb.is_public);
}

#[tokio::test]
async fn test_version_marker_advances_per_generation() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    let first: VersionMarker = h.blob.json("metadata/version.json");
    let v1 = first.get(engine.collection()).unwrap().version;

    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    let second: VersionMarker = h.blob.json("metadata/version.json");
    let v2 = second.get(engine.collection()).unwrap().version;

    assert!(v2 > v1);
    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    assert_eq!(gallery.version, v2);
}

#[tokio::test]
async fn test_watermark_is_generation_start() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();

    engine.run_sync(&items(3)).await.unwrap();
    let started = engine
        .state()
        .load_checkpoint()
        .await
        .unwrap()
        .unwrap()
        .generation_started_at;
    assert!(engine.state().load_watermark().await.unwrap().is_none());

    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(engine.state().load_watermark().await.unwrap(), Some(started));
}

#[tokio::test]
async fn test_run_log_is_private_and_dated() {
    let h = Harness::with_two_albums().await;
    h.engine().run_sync(&RunBudget::unlimited()).await.unwrap();

    let logs = h.blob.keys_with_prefix("logs/gallery-sync-");
    assert_eq!(logs.len(), 1);
    assert!(!h.blob.object(&logs[0]).unwrap().is_public);

    let log: RunLog = h.blob.json(&logs[0]);
    assert_eq!(log.status, RunStatus::Complete);
    assert_eq!(log.counters.items_uploaded, 5);
}

// ============================================================================
// Existing objects and empty albums
// ============================================================================

#[tokio::test]
async fn test_objects_uploaded_before_a_crash_are_probed_not_reuploaded() {
    let h = Harness::with_two_albums().await;
    // A previous run died after uploading A1 but before any manifest
    h.blob.seed("images/A1-400.jpg", b"thumb");
    h.blob.seed("images/A1-original.jpg", b"orig");
    // A2 only got halfway
    h.blob.seed("images/A2-400.jpg", b"thumb");

    let result = h.engine().run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(result.items_skipped, 1);
    assert_eq!(result.items_uploaded, 4);
    assert_eq!(h.source.fetch_count("A1"), 0);
    assert_eq!(h.source.fetch_count("A2"), 1);

    let manifest: AlbumManifest = h.blob.json("gallery/albums/A.json");
    assert!(manifest.items[0].complete);
    assert_eq!(manifest.items[0].urls.len(), 2);
}

#[tokio::test]
async fn test_empty_album_is_skipped_and_stale_manifest_removed() {
    let h = Harness::with_two_albums().await;
    h.source.add_album("E", 0);
    h.blob.seed("gallery/albums/E.json", b"{}");

    let result = h.engine().run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(result.status, RunStatus::Complete);
    assert_eq!(result.items_processed, 5);
    assert!(!h.blob.contains("gallery/albums/E.json"));

    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    assert!(gallery.albums.iter().all(|a| a.id != album_id("E")));
}

#[tokio::test]
async fn test_album_vanished_after_enumeration_counts_zero_items() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();
    engine.run_sync(&RunBudget::new(Duration::ZERO)).await.unwrap();

    h.source.vanish_album("A");
    let result = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(result.status, RunStatus::Complete);
    assert_eq!(result.items_processed, 2);

    let gallery: GalleryManifest = h.blob.json("gallery/albums.json");
    assert_eq!(gallery.albums.len(), 1);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_item_failure_continues_and_reports_partial() {
    let h = Harness::with_two_albums().await;
    h.source.fail_item("A2");
    let engine = h.engine();

    let result = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(result.items_processed, 5);
    assert_eq!(result.items_uploaded, 4);
    assert_eq!(result.items_failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("A2:"));

    let manifest: AlbumManifest = h.blob.json("gallery/albums/A.json");
    let a2 = manifest.items.iter().find(|i| i.id.as_str() == "A2").unwrap();
    assert!(!a2.complete);
    assert_eq!(a2.attempts, 1);

    // The next generation retries it
    h.source.heal_item("A2");
    let retry = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(retry.status, RunStatus::Complete);
    assert_eq!(retry.items_uploaded, 1);
    assert_eq!(retry.items_skipped, 4);
}

#[tokio::test]
async fn test_bounded_retries_stop_fetching() {
    let h = Harness::with_config(test_config().sync_max_item_attempts(2).build()).await;
    h.source.add_album("A", 2);
    h.source.fail_item("A2");
    let engine = h.engine();

    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    let fetches = h.source.fetch_count("A2");

    let third = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(third.status, RunStatus::Partial);
    assert_eq!(third.items_failed, 1);
    assert!(third.errors[0].contains("giving up"));
    assert_eq!(h.source.fetch_count("A2"), fetches);
}

#[tokio::test]
async fn test_malformed_manifest_is_fatal() {
    let h = Harness::with_two_albums().await;
    h.blob.seed("gallery/albums/A.json", b"{ not json");
    let engine = h.engine();

    let err = engine.run_sync(&RunBudget::unlimited()).await.unwrap_err();
    assert!(matches!(err, SyncError::MalformedManifest { ref key, .. } if key == "gallery/albums/A.json"));

    let checkpoint = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.run_status, RunStatus::Partial);
    assert_eq!(h.blob.image_puts(), 0);
}

#[tokio::test]
async fn test_auth_failure_aborts_run_and_keeps_position() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();
    engine.run_sync(&items(3)).await.unwrap();

    h.blob.set_unauthorized(true);
    let err = engine.run_sync(&RunBudget::unlimited()).await.unwrap_err();
    assert!(matches!(err, SyncError::BlobStore(ref e) if e.is_fatal()));

    let checkpoint = engine.state().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.run_status, RunStatus::Partial);
    assert_eq!((checkpoint.album_index, checkpoint.item_index), (1, 0));
    assert_eq!(
        engine.failure_tracker().state().await.unwrap().consecutive_failures,
        1
    );

    h.blob.set_unauthorized(false);
    let resumed = engine.run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(resumed.status, RunStatus::Complete);
    assert_eq!(resumed.items_uploaded, 2);
    assert!(engine.failure_tracker().state().await.unwrap().is_clear());
}

#[tokio::test]
async fn test_source_auth_failure_on_fetch_is_fatal() {
    let h = Harness::with_two_albums().await;
    let engine = h.engine();
    engine.run_sync(&RunBudget::new(Duration::ZERO)).await.unwrap();

    h.source.set_unauthorized(true);
    let err = engine.run_sync(&RunBudget::unlimited()).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, SyncError::Source(_)));
}

#[tokio::test]
async fn test_three_fatal_runs_alert_once() {
    let h = Harness::with_two_albums().await;
    h.source.set_unauthorized(true);
    let engine = h.engine();

    for _ in 0..4 {
        assert!(engine.run_sync(&RunBudget::unlimited()).await.is_err());
    }
    assert_eq!(h.notifier.count(), 1);
    assert_eq!(
        engine.failure_tracker().state().await.unwrap().consecutive_failures,
        4
    );
}

// ============================================================================
// Lease
// ============================================================================

#[tokio::test]
async fn test_held_lease_fails_fast() {
    let h = Harness::with_two_albums().await;
    assert!(h
        .store
        .try_acquire_lease("sync:gallery", "other-process", Duration::from_secs(60))
        .await
        .unwrap());

    let err = h.engine().run_sync(&RunBudget::unlimited()).await.unwrap_err();
    assert!(matches!(err, SyncError::LeaseHeld { .. }));
    assert_eq!(h.source.total_fetches(), 0);
    assert!(h.engine().state().load_checkpoint().await.unwrap().is_none());
    // Contention is not a failure of the sync itself
    assert!(h
        .engine()
        .failure_tracker()
        .state()
        .await
        .unwrap()
        .is_clear());
}

#[tokio::test]
async fn test_lease_released_after_run() {
    let h = Harness::with_two_albums().await;
    h.engine().run_sync(&items(1)).await.unwrap();

    assert!(h
        .store
        .try_acquire_lease("sync:gallery", "other-process", Duration::from_secs(60))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_lease_lost_at_album_boundary_leaves_state_alone() {
    let h = Harness::with_two_albums().await;
    let store = Arc::new(LeaseLosingStore::new(h.store.clone(), 1));
    let engine = h.engine_over(store.clone());

    let err = engine.run_sync(&RunBudget::unlimited()).await.unwrap_err();
    assert!(matches!(err, SyncError::LeaseHeld { .. }));
    // Initial claim, then the renewal after album A
    assert_eq!(store.attempts(), 2);
    assert_eq!(h.source.fetch_count("B1"), 0);

    // No checkpoint was written for the new holder to trip over
    assert!(engine.state().load_checkpoint().await.unwrap().is_none());
    assert!(engine.failure_tracker().state().await.unwrap().is_clear());
    assert_eq!(h.notifier.count(), 0);

    let next = h.engine().run_sync(&RunBudget::unlimited()).await.unwrap();
    assert_eq!(next.status, RunStatus::Complete);
    assert_eq!((next.items_uploaded, next.items_skipped), (2, 3));
}

#[tokio::test]
async fn test_engine_rejects_lease_not_outliving_budget() {
    let h = Harness::with_config(test_config().sync_lease_ttl_secs(0).build()).await;

    let err = SyncEngine::new(
        h.source.clone(),
        h.blob.clone(),
        h.store.clone(),
        h.notifier.clone(),
        &h.config,
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("sync.lease_ttl_secs"));
}
