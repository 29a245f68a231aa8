//! Typed access to the checkpoint store
//!
//! The store itself only knows string keys and string values. This module
//! owns the key names of one collection and the JSON encoding of what is
//! kept under them: the resume checkpoint, the failure state and the
//! watermark. It also wraps the collection's lease.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use gallerysync_core::domain::{Checkpoint, CollectionName, FailureState, RunCounters, RunStatus};
use gallerysync_core::ports::ICheckpointStore;

use crate::SyncError;

/// Per-collection view of the checkpoint store
#[derive(Clone)]
pub struct StateRepository {
    store: Arc<dyn ICheckpointStore>,
    collection: CollectionName,
}

impl StateRepository {
    pub fn new(store: Arc<dyn ICheckpointStore>, collection: CollectionName) -> Self {
        Self { store, collection }
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    // ========================================================================
    // Checkpoint
    // ========================================================================

    /// Loads and validates the resume checkpoint
    pub async fn load_checkpoint(&self) -> Result<Option<Checkpoint>, SyncError> {
        let key = self.collection.checkpoint_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let checkpoint: Checkpoint = serde_json::from_str(&raw).with_context(|| {
            format!("Unreadable checkpoint under '{key}'; run `gallerysync reset` to discard it")
        })?;
        checkpoint.validate()?;
        Ok(Some(checkpoint))
    }

    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SyncError> {
        let key = self.collection.checkpoint_key();
        let raw = serde_json::to_string(checkpoint).context("Failed to encode checkpoint")?;
        self.store
            .set(&key, &raw)
            .await
            .with_context(|| format!("Failed to persist checkpoint '{key}'"))?;

        debug!(
            album_index = checkpoint.album_index,
            item_index = checkpoint.item_index,
            status = %checkpoint.run_status,
            "Checkpoint saved"
        );
        Ok(())
    }

    pub async fn clear_checkpoint(&self) -> Result<(), SyncError> {
        self.store
            .delete(&self.collection.checkpoint_key())
            .await
            .context("Failed to delete checkpoint")?;
        Ok(())
    }

    // ========================================================================
    // Failure state
    // ========================================================================

    /// Loads the failure state; an unreadable value counts as a clean slate
    pub async fn load_failures(&self) -> Result<FailureState, SyncError> {
        let key = self.collection.failures_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(FailureState::default());
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable failure state");
                Ok(FailureState::default())
            }
        }
    }

    pub async fn save_failures(&self, state: &FailureState) -> Result<(), SyncError> {
        let raw = serde_json::to_string(state).context("Failed to encode failure state")?;
        self.store
            .set(&self.collection.failures_key(), &raw)
            .await
            .context("Failed to persist failure state")?;
        Ok(())
    }

    pub async fn clear_failures(&self) -> Result<(), SyncError> {
        self.store
            .delete(&self.collection.failures_key())
            .await
            .context("Failed to delete failure state")?;
        Ok(())
    }

    // ========================================================================
    // Watermark
    // ========================================================================

    /// Start time of the last finished generation
    pub async fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let key = self.collection.watermark_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let watermark = DateTime::parse_from_rfc3339(raw.trim())
            .with_context(|| format!("Unreadable watermark under '{key}': {raw}"))?
            .with_timezone(&Utc);
        Ok(Some(watermark))
    }

    pub async fn save_watermark(&self, watermark: DateTime<Utc>) -> Result<(), SyncError> {
        self.store
            .set(&self.collection.watermark_key(), &watermark.to_rfc3339())
            .await
            .context("Failed to persist watermark")?;
        Ok(())
    }

    // ========================================================================
    // Lease
    // ========================================================================

    /// Claims (or extends) the collection's lease for `holder`
    pub async fn acquire_lease(&self, holder: &str, ttl: Duration) -> Result<(), SyncError> {
        let acquired = self
            .store
            .try_acquire_lease(&self.collection.lease_name(), holder, ttl)
            .await
            .context("Failed to acquire sync lease")?;

        if !acquired {
            return Err(SyncError::LeaseHeld {
                collection: self.collection.to_string(),
            });
        }
        Ok(())
    }

    pub async fn release_lease(&self, holder: &str) -> Result<(), SyncError> {
        self.store
            .release_lease(&self.collection.lease_name(), holder)
            .await
            .context("Failed to release sync lease")?;
        Ok(())
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Everything the checkpoint store knows about the collection
    pub async fn status(&self) -> Result<CollectionStatus, SyncError> {
        let checkpoint = self.load_checkpoint().await?.map(|cp| CheckpointSummary {
            album_index: cp.album_index,
            album_count: cp.albums.len(),
            item_index: cp.item_index,
            current_album: cp.current().map(|p| p.album.name().to_string()),
            generation_started_at: cp.generation_started_at,
            last_run_at: cp.last_run_at,
            run_status: cp.run_status,
            totals: cp.totals,
        });

        Ok(CollectionStatus {
            collection: self.collection.clone(),
            checkpoint,
            failures: self.load_failures().await?,
            watermark: self.load_watermark().await?,
        })
    }
}

/// Position of a paused generation
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub album_index: usize,
    pub album_count: usize,
    pub item_index: usize,
    pub current_album: Option<String>,
    pub generation_started_at: DateTime<Utc>,
    pub last_run_at: DateTime<Utc>,
    pub run_status: RunStatus,
    pub totals: RunCounters,
}

/// Snapshot reported by `gallerysync status`
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub collection: CollectionName,
    pub checkpoint: Option<CheckpointSummary>,
    pub failures: FailureState,
    pub watermark: Option<DateTime<Utc>>,
}
