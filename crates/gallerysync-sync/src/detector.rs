//! Change detection
//!
//! Scans every album and item of the source and compares their timestamps
//! with a watermark (the start of the last finished generation). The scan
//! is metadata only; no item bytes are fetched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use gallerysync_core::domain::{AlbumId, VersionEntry};
use gallerysync_core::ports::{ISourceCollection, SourceError};

use crate::publisher::Publisher;
use crate::state::StateRepository;
use crate::SyncError;

/// What changed in the source since the watermark
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub since: Option<DateTime<Utc>>,
    pub has_changes: bool,
    pub new_item_count: u64,
    pub modified_item_count: u64,
    /// In source order
    pub changed_album_ids: Vec<AlbumId>,
}

pub struct ChangeDetector {
    source: Arc<dyn ISourceCollection>,
    state: StateRepository,
    publisher: Publisher,
}

impl ChangeDetector {
    pub fn new(
        source: Arc<dyn ISourceCollection>,
        state: StateRepository,
        publisher: Publisher,
    ) -> Self {
        Self {
            source,
            state,
            publisher,
        }
    }

    /// Full scan of the source against `since`
    ///
    /// An album counts as changed when it was created or modified after
    /// `since`, or when any of its items was.
    #[tracing::instrument(skip(self), fields(collection = %self.state.collection()))]
    pub async fn detect_changes(&self, since: DateTime<Utc>) -> Result<ChangeReport, SyncError> {
        let albums = self.source.list_albums().await?;
        let mut report = ChangeReport {
            since: Some(since),
            ..Default::default()
        };

        for album in &albums {
            let items = match self.source.list_items(album.id()).await {
                Ok(items) => items,
                Err(SourceError::NotFound(reason)) => {
                    warn!(album = %album.id(), %reason, "Album vanished during scan");
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };

            let new_items = items.iter().filter(|i| i.is_new_since(since)).count() as u64;
            let modified_items = items
                .iter()
                .filter(|i| i.is_modified_since(since))
                .count() as u64;
            let album_touched = album.created_at() > since || album.modified_at() > since;

            if album_touched || new_items > 0 || modified_items > 0 {
                debug!(
                    album = %album.id(),
                    new_items,
                    modified_items,
                    "Album changed"
                );
                report.changed_album_ids.push(album.id().clone());
            }
            report.new_item_count += new_items;
            report.modified_item_count += modified_items;
        }

        report.has_changes = !report.changed_album_ids.is_empty();
        info!(
            albums = albums.len(),
            changed_albums = report.changed_album_ids.len(),
            new_items = report.new_item_count,
            modified_items = report.modified_item_count,
            "Change detection finished"
        );
        Ok(report)
    }

    /// Drops cached listings of changed albums that the paused generation
    /// has not started yet, so they are re-read when the cursor gets there
    ///
    /// Returns the invalidated album IDs; empty when there is no checkpoint.
    pub async fn invalidate(&self, report: &ChangeReport) -> Result<Vec<AlbumId>, SyncError> {
        if !report.has_changes {
            return Ok(Vec::new());
        }
        let Some(mut checkpoint) = self.state.load_checkpoint().await? else {
            return Ok(Vec::new());
        };

        let changed: HashSet<AlbumId> = report.changed_album_ids.iter().cloned().collect();
        let invalidated = checkpoint.invalidate(&changed);
        if !invalidated.is_empty() {
            self.state.save_checkpoint(&checkpoint).await?;
            info!(albums = invalidated.len(), "Checkpoint caches invalidated");
        }
        Ok(invalidated)
    }

    /// Records that the source was checked and nothing changed
    pub async fn heartbeat(&self) -> Result<VersionEntry, SyncError> {
        self.publisher.heartbeat(Utc::now()).await
    }
}
