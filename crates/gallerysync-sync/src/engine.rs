//! Resumable sync engine
//!
//! The [`SyncEngine`] mirrors the albums of a source collection into the
//! blob store, one item at a time, within a [`RunBudget`].
//!
//! ## Sync Flow
//!
//! 1. **Claim**: acquire the collection lease, load the checkpoint or
//!    enumerate albums to start a new generation at `0,0`
//! 2. **Items**: for the item under the cursor, skip it if its record is
//!    complete, else probe every required variant in the blob store and
//!    upload only the missing ones
//! 3. **Album boundary**: when the last item of an album is done, publish its
//!    manifest, keep its summary and move the cursor to the next album
//! 4. **Generation end**: publish the gallery manifest, advance the version
//!    marker, store the watermark and delete the checkpoint
//!
//! The budget is checked before the first item and after every item step.
//! An album boundary belongs to the item step that reached it, so a pause
//! never separates the last item of an album from its manifest.
//!
//! ## Errors
//!
//! Per-item source and blob store failures leave the item incomplete and the
//! run continues. Authentication failures, malformed manifests and store
//! failures abort the run: the checkpoint is saved as `partial`, the failure
//! tracker counts the failure and the error is returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use gallerysync_core::config::Config;
use gallerysync_core::domain::{
    AlbumManifest, Checkpoint, CollectionName, ItemId, ObjectLayout, RemoteObjectRecord,
    RunCounters, RunLog, RunStatus, SourceItem, Variant,
};
use gallerysync_core::ports::{
    IBlobStore, ICheckpointStore, INotificationService, ISourceCollection, SourceError,
};

use crate::budget::{BudgetClock, RunBudget};
use crate::failure::FailureTracker;
use crate::publisher::Publisher;
use crate::state::StateRepository;
use crate::SyncError;

// ============================================================================
// RunResult
// ============================================================================

/// Summary of one `run_sync` invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// Items handled in this run, failed ones included
    pub items_processed: u64,
    pub items_uploaded: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
    /// Per-item errors, plus the fatal error if the run was aborted
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl RunResult {
    fn new(status: RunStatus, tally: RunTally, duration_ms: u64) -> Self {
        Self {
            status,
            items_processed: tally.counters.items_processed,
            items_uploaded: tally.counters.items_uploaded,
            items_skipped: tally.counters.items_skipped,
            items_failed: tally.counters.items_failed,
            errors: tally.errors,
            duration_ms,
        }
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            items_processed: self.items_processed,
            items_uploaded: self.items_uploaded,
            items_skipped: self.items_skipped,
            items_failed: self.items_failed,
        }
    }
}

/// Result of one item step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Uploaded,
    Skipped,
    Failed,
}

/// Counters and errors of the current run
#[derive(Debug, Default)]
struct RunTally {
    counters: RunCounters,
    errors: Vec<String>,
}

impl RunTally {
    /// Counts an item in this run and in the generation totals
    fn count(&mut self, checkpoint: &mut Checkpoint, outcome: ItemOutcome) {
        for counters in [&mut self.counters, &mut checkpoint.totals] {
            match outcome {
                ItemOutcome::Uploaded => counters.uploaded(),
                ItemOutcome::Skipped => counters.skipped(),
                ItemOutcome::Failed => counters.failed(),
            }
        }
    }
}

/// Records loaded from an album manifest, with retry counters reset for
/// items the source modified after the manifest was written
fn fresh_records(
    manifest: &AlbumManifest,
    items: &[SourceItem],
) -> BTreeMap<ItemId, RemoteObjectRecord> {
    let mut records = manifest.records();
    for item in items {
        if item.modified_at() <= manifest.updated_at {
            continue;
        }
        if let Some(record) = records.get_mut(item.id()) {
            if !record.is_complete() {
                record.attempts = 0;
            }
        }
    }
    records
}

/// Lease holder identity of this process
fn default_holder() -> String {
    format!("pid{}-{}", std::process::id(), Uuid::new_v4())
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Budgeted, resumable album synchronization engine
///
/// ## Dependencies
///
/// - `source`: album/item listings and variant bytes
/// - `blob_store`: existence probes and uploads
/// - `state`: checkpoint, watermark and lease (over the checkpoint store)
/// - `publisher`: manifests, version marker and run logs
/// - `failures`: consecutive failure counter and alerting
pub struct SyncEngine {
    source: Arc<dyn ISourceCollection>,
    blob_store: Arc<dyn IBlobStore>,
    state: StateRepository,
    publisher: Publisher,
    failures: FailureTracker,
    /// Variants every item must have before it counts as complete
    variants: Vec<Variant>,
    max_item_attempts: Option<u32>,
    lease_ttl: Duration,
    holder: String,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given adapters
    ///
    /// # Arguments
    /// * `source` - Source collection (ISourceCollection)
    /// * `blob_store` - Destination object store (IBlobStore)
    /// * `checkpoint_store` - Persistent property bag (ICheckpointStore)
    /// * `notifier` - Alert channel (INotificationService)
    /// * `config` - Collection name, variants, retry and alert settings
    pub fn new(
        source: Arc<dyn ISourceCollection>,
        blob_store: Arc<dyn IBlobStore>,
        checkpoint_store: Arc<dyn ICheckpointStore>,
        notifier: Arc<dyn INotificationService>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let collection = config.collection_name()?;
        let variants = config.variants.required();
        if variants.is_empty() {
            anyhow::bail!("No variants configured; set variants.widths or variants.include_original");
        }
        if config.sync.lease_ttl() <= config.sync.budget() {
            anyhow::bail!(
                "sync.lease_ttl_secs ({}) must exceed sync.budget_secs ({})",
                config.sync.lease_ttl_secs,
                config.sync.budget_secs
            );
        }

        let state = StateRepository::new(checkpoint_store, collection.clone());
        let publisher = Publisher::new(Arc::clone(&blob_store), collection);
        let failures =
            FailureTracker::new(state.clone(), notifier, config.alerts.failure_threshold);

        Ok(Self {
            source,
            blob_store,
            state,
            publisher,
            failures,
            variants,
            max_item_attempts: config.sync.max_item_attempts,
            lease_ttl: config.sync.lease_ttl(),
            holder: default_holder(),
        })
    }

    /// Overrides the lease holder identity
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    pub fn collection(&self) -> &CollectionName {
        self.state.collection()
    }

    pub fn source(&self) -> &Arc<dyn ISourceCollection> {
        &self.source
    }

    pub fn state(&self) -> &StateRepository {
        &self.state
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn failure_tracker(&self) -> &FailureTracker {
        &self.failures
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    // ========================================================================
    // run_sync
    // ========================================================================

    /// Runs the sync until the generation finishes or the budget runs out
    ///
    /// Returns `Paused` when the budget ran out, `Complete` when the
    /// generation finished with every item published and `Partial` when it
    /// finished with items left incomplete. Fatal errors are returned after
    /// the checkpoint has been saved, except a lease lost mid-run, which
    /// leaves the checkpoint and the failure count untouched.
    #[tracing::instrument(skip(self, budget), fields(collection = %self.state.collection()))]
    pub async fn run_sync(&self, budget: &RunBudget) -> Result<RunResult, SyncError> {
        let clock = budget.start();
        let started_at = Utc::now();

        self.state.acquire_lease(&self.holder, self.lease_ttl).await?;
        info!(
            holder = %self.holder,
            budget_ms = u64::try_from(budget.wall_clock().as_millis()).unwrap_or(u64::MAX),
            max_items = ?budget.max_items(),
            "Starting sync run"
        );

        let mut tally = RunTally::default();
        let outcome = self.run_locked(&clock, &mut tally).await;

        if let Err(e) = self.state.release_lease(&self.holder).await {
            warn!(error = %e, "Failed to release sync lease");
        }

        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(status) => {
                if let Err(e) = self.failures.record_success().await {
                    warn!(error = %e, "Failed to clear failure state");
                }
                let result = RunResult::new(status, tally, duration_ms);
                info!(
                    status = %result.status,
                    processed = result.items_processed,
                    uploaded = result.items_uploaded,
                    skipped = result.items_skipped,
                    failed = result.items_failed,
                    duration_ms,
                    "Sync run finished"
                );
                self.write_run_log(&result, started_at).await;
                Ok(result)
            }
            Err(err) => {
                error!(error = %err, "Sync run aborted");
                let message = err.to_string();
                // Losing the lease means another run owns the generation
                if !matches!(err, SyncError::LeaseHeld { .. }) {
                    if let Err(e) = self.failures.record_failure(&message).await {
                        warn!(error = %e, "Failed to record sync failure");
                    }
                }
                tally.errors.push(message);
                let result = RunResult::new(RunStatus::Partial, tally, duration_ms);
                self.write_run_log(&result, started_at).await;
                Err(err)
            }
        }
    }

    async fn run_locked(
        &self,
        clock: &BudgetClock,
        tally: &mut RunTally,
    ) -> Result<RunStatus, SyncError> {
        let mut checkpoint = match self.state.load_checkpoint().await? {
            Some(checkpoint) => {
                info!(
                    album_index = checkpoint.album_index,
                    item_index = checkpoint.item_index,
                    albums = checkpoint.albums.len(),
                    generation_started_at = %checkpoint.generation_started_at,
                    "Resuming generation"
                );
                checkpoint
            }
            None => self.start_generation().await?,
        };

        let outcome = match self.advance(&mut checkpoint, clock, tally).await {
            Ok(true) => self.finish_generation(&checkpoint).await,
            Ok(false) => Ok(RunStatus::Paused),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(RunStatus::Paused) => {
                self.suspend(&mut checkpoint, RunStatus::Paused, tally)
                    .await?;
                info!(
                    album_index = checkpoint.album_index,
                    item_index = checkpoint.item_index,
                    "Budget exhausted, generation paused"
                );
                Ok(RunStatus::Paused)
            }
            Ok(status) => Ok(status),
            Err(err @ SyncError::LeaseHeld { .. }) => {
                warn!(
                    album_index = checkpoint.album_index,
                    item_index = checkpoint.item_index,
                    "Lease lost to another run, leaving the checkpoint untouched"
                );
                Err(err)
            }
            Err(err) => {
                if let Err(save_err) = self
                    .suspend(&mut checkpoint, RunStatus::Partial, tally)
                    .await
                {
                    error!(error = %save_err, "Failed to save checkpoint after fatal error");
                }
                Err(err)
            }
        }
    }

    /// Enumerates albums and starts a generation at the origin
    async fn start_generation(&self) -> Result<Checkpoint, SyncError> {
        let albums = self.source.list_albums().await?;
        let checkpoint = Checkpoint::start(albums, Utc::now());
        info!(
            albums = checkpoint.albums.len(),
            "Starting new generation"
        );
        Ok(checkpoint)
    }

    async fn suspend(
        &self,
        checkpoint: &mut Checkpoint,
        status: RunStatus,
        tally: &RunTally,
    ) -> Result<(), SyncError> {
        checkpoint.suspend(status, tally.counters, Utc::now());
        self.state.save_checkpoint(checkpoint).await
    }

    /// Walks the cursor until the generation is finished (`true`) or the
    /// budget is exhausted (`false`)
    async fn advance(
        &self,
        checkpoint: &mut Checkpoint,
        clock: &BudgetClock,
        tally: &mut RunTally,
    ) -> Result<bool, SyncError> {
        if clock.is_exhausted(tally.counters.items_processed) {
            return Ok(checkpoint.is_finished());
        }

        while !checkpoint.is_finished() {
            self.load_current_album(checkpoint).await?;

            if self.step(checkpoint, tally).await? {
                self.finish_album(checkpoint).await?;
                if !checkpoint.is_finished() {
                    // Renew before saving so a lost lease leaves the cursor to the new holder
                    self.state.acquire_lease(&self.holder, self.lease_ttl).await?;
                    self.suspend(checkpoint, RunStatus::Paused, tally).await?;
                }
            }

            if clock.is_exhausted(tally.counters.items_processed) {
                return Ok(checkpoint.is_finished());
            }
        }
        Ok(true)
    }

    /// Loads the current album's item list and record map, once
    async fn load_current_album(&self, checkpoint: &mut Checkpoint) -> Result<(), SyncError> {
        let Some(progress) = checkpoint.current_mut() else {
            return Ok(());
        };

        if progress.items.is_none() {
            let items = match self.source.list_items(progress.album.id()).await {
                Ok(items) => items,
                Err(SourceError::NotFound(reason)) => {
                    warn!(album = %progress.album.id(), %reason, "Album no longer in source");
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            debug!(album = %progress.album.id(), items = items.len(), "Album items listed");
            progress.items = Some(items);
        }

        let items = progress.items.as_deref().unwrap_or_default();
        if items.is_empty() {
            // Nothing to look up; a leftover manifest is deleted at the boundary
            progress.records = Some(BTreeMap::new());
            return Ok(());
        }

        if progress.records.is_none() {
            let manifest = self
                .publisher
                .load_album_manifest(progress.album.id())
                .await?;
            let records = match manifest {
                Some(manifest) => fresh_records(&manifest, items),
                None => BTreeMap::new(),
            };
            debug!(
                album = %progress.album.id(),
                records = records.len(),
                "Album records loaded"
            );
            progress.records = Some(records);
        }
        Ok(())
    }

    /// Processes the item under the cursor
    ///
    /// Returns true once the cursor has reached the end of the album.
    async fn step(
        &self,
        checkpoint: &mut Checkpoint,
        tally: &mut RunTally,
    ) -> Result<bool, SyncError> {
        let index = checkpoint.item_index;
        let progress = checkpoint
            .current_mut()
            .context("Cursor is past the last album")?;
        let items = progress.items.as_deref().unwrap_or_default();
        let item_count = items.len();
        let Some(item) = items.get(index).cloned() else {
            return Ok(true);
        };

        let records = progress.records.get_or_insert_with(BTreeMap::new);
        let mut record = records.get(item.id()).cloned().unwrap_or_default();

        let outcome = self
            .sync_item(&item, &mut record, &mut tally.errors)
            .await?;
        records.insert(item.id().clone(), record);

        tally.count(checkpoint, outcome);
        checkpoint.advance_item();
        Ok(checkpoint.item_index >= item_count)
    }

    /// Brings one item to completion, turning non-fatal errors into a
    /// failed outcome
    async fn sync_item(
        &self,
        item: &SourceItem,
        record: &mut RemoteObjectRecord,
        errors: &mut Vec<String>,
    ) -> Result<ItemOutcome, SyncError> {
        if record.is_complete() {
            return Ok(ItemOutcome::Skipped);
        }

        if record.attempts_exhausted(self.max_item_attempts) {
            let message = format!(
                "{}: giving up after {} failed attempts",
                item.id(),
                record.attempts
            );
            debug!(item = %item.id(), attempts = record.attempts, "Retry limit reached");
            errors.push(message);
            return Ok(ItemOutcome::Failed);
        }

        match self.upload_item(item, record).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                record.record_failed_attempt();
                warn!(
                    item = %item.id(),
                    attempts = record.attempts,
                    error = %err,
                    "Item failed, leaving it incomplete"
                );
                errors.push(format!("{}: {}", item.id(), err));
                Ok(ItemOutcome::Failed)
            }
        }
    }

    /// Probes every required variant and uploads the missing ones
    async fn upload_item(
        &self,
        item: &SourceItem,
        record: &mut RemoteObjectRecord,
    ) -> Result<ItemOutcome, SyncError> {
        let mut missing = Vec::new();
        for &variant in &self.variants {
            let key = ObjectLayout::variant_key(item, variant);
            if self.blob_store.exists(&key).await? {
                record.set_url(variant.name(), self.blob_store.public_url(&key));
            } else {
                missing.push((variant, key));
            }
        }

        if missing.is_empty() {
            record.mark_complete();
            debug!(item = %item.id(), "All variants already present");
            return Ok(ItemOutcome::Skipped);
        }

        for (variant, key) in missing {
            let bytes = self.source.fetch_variant(item, variant).await?;
            let size = bytes.len();
            self.blob_store
                .put(&key, bytes, variant.content_type(item), true)
                .await?;
            record.set_url(variant.name(), self.blob_store.public_url(&key));
            debug!(item = %item.id(), %variant, key, size, "Variant uploaded");
        }

        record.mark_complete();
        Ok(ItemOutcome::Uploaded)
    }

    /// Publishes the current album's manifest and moves the cursor on
    async fn finish_album(&self, checkpoint: &mut Checkpoint) -> Result<(), SyncError> {
        let progress = checkpoint
            .current()
            .context("Cursor is past the last album")?;
        let items = progress.items.as_deref().unwrap_or_default();
        let empty = BTreeMap::new();
        let records = progress.records.as_ref().unwrap_or(&empty);
        let manifest = AlbumManifest::build(&progress.album, items, records, Utc::now());

        let summary = if items.is_empty() {
            self.publisher
                .delete_album_manifest(progress.album.id())
                .await?;
            info!(album = %progress.album.id(), "Album is empty, skipped");
            manifest.summary()
        } else {
            self.publisher.publish_album(&manifest).await?
        };

        checkpoint.finish_album(summary);
        Ok(())
    }

    async fn finish_generation(&self, checkpoint: &Checkpoint) -> Result<RunStatus, SyncError> {
        self.publisher
            .publish_gallery(checkpoint.summaries(), Utc::now())
            .await?;
        self.state
            .save_watermark(checkpoint.generation_started_at)
            .await?;
        self.state.clear_checkpoint().await?;

        let status = if checkpoint.totals.items_failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        };
        info!(
            %status,
            albums = checkpoint.albums.len(),
            items = checkpoint.totals.items_processed,
            failed = checkpoint.totals.items_failed,
            "Generation finished"
        );
        Ok(status)
    }

    /// Best-effort run log
    async fn write_run_log(&self, result: &RunResult, started_at: DateTime<Utc>) {
        let log = RunLog {
            collection: self.state.collection().clone(),
            status: result.status,
            started_at,
            finished_at: Utc::now(),
            duration_ms: result.duration_ms,
            counters: result.counters(),
            errors: result.errors.clone(),
        };
        if let Err(e) = self.publisher.write_run_log(&log).await {
            warn!(error = %e, "Failed to write run log");
        }
    }
}
