//! Resume state of a sync generation
//!
//! A generation starts with a fresh album enumeration and ends when the
//! cursor walks past the last album. Between invocations the whole state is
//! persisted as a `Checkpoint`; the album order captured at enumeration is
//! never recomputed until the generation finishes.

use std::collections::{BTreeMap, HashSet};
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::album::{SourceAlbum, SourceItem};
use super::errors::DomainError;
use super::manifest::{AlbumSummary, RemoteObjectRecord};
use super::newtypes::{AlbumId, ItemId};

// ============================================================================
// RunStatus / RunCounters
// ============================================================================

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Budget exhausted, a checkpoint is waiting to be resumed
    Paused,
    /// Interrupted by an error, or finished with incomplete items
    Partial,
    /// Generation finished with every item published
    Complete,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Paused => write!(f, "paused"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Complete => write!(f, "complete"),
        }
    }
}

/// Item counters of a run
///
/// `items_processed` counts every item the cursor moved past, so it includes
/// uploaded, skipped and failed items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounters {
    pub items_processed: u64,
    pub items_uploaded: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
}

impl RunCounters {
    pub fn uploaded(&mut self) {
        self.items_processed += 1;
        self.items_uploaded += 1;
    }

    pub fn skipped(&mut self) {
        self.items_processed += 1;
        self.items_skipped += 1;
    }

    pub fn failed(&mut self) {
        self.items_processed += 1;
        self.items_failed += 1;
    }
}

impl AddAssign for RunCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.items_processed += rhs.items_processed;
        self.items_uploaded += rhs.items_uploaded;
        self.items_skipped += rhs.items_skipped;
        self.items_failed += rhs.items_failed;
    }
}

// ============================================================================
// AlbumProgress
// ============================================================================

/// One album of the generation snapshot plus its per-run caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumProgress {
    pub album: SourceAlbum,
    /// Item listing, loaded once when the album is reached
    #[serde(default)]
    pub items: Option<Vec<SourceItem>>,
    /// Remote records, seeded from the album manifest
    #[serde(default)]
    pub records: Option<BTreeMap<ItemId, RemoteObjectRecord>>,
    /// Set once the album has been published
    #[serde(default)]
    pub summary: Option<AlbumSummary>,
}

impl AlbumProgress {
    pub fn new(album: SourceAlbum) -> Self {
        Self {
            album,
            items: None,
            records: None,
            summary: None,
        }
    }

    /// Returns true if both caches are loaded
    pub fn is_loaded(&self) -> bool {
        self.items.is_some() && self.records.is_some()
    }

    /// Drops the cached listing and records
    pub fn clear_caches(&mut self) {
        self.items = None;
        self.records = None;
    }
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Persisted cursor over the albums of a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub albums: Vec<AlbumProgress>,
    pub album_index: usize,
    pub item_index: usize,
    pub generation_started_at: DateTime<Utc>,
    pub last_run_at: DateTime<Utc>,
    pub run_status: RunStatus,
    /// Counters of the last run that touched this checkpoint
    #[serde(default)]
    pub counters: RunCounters,
    /// Counters accumulated over the whole generation
    #[serde(default)]
    pub totals: RunCounters,
}

impl Checkpoint {
    /// Starts a generation over a fresh album enumeration
    pub fn start(albums: Vec<SourceAlbum>, now: DateTime<Utc>) -> Self {
        Self {
            albums: albums.into_iter().map(AlbumProgress::new).collect(),
            album_index: 0,
            item_index: 0,
            generation_started_at: now,
            last_run_at: now,
            run_status: RunStatus::Paused,
            counters: RunCounters::default(),
            totals: RunCounters::default(),
        }
    }

    /// Checks the cursor invariants after loading from storage
    ///
    /// # Errors
    /// Returns `CursorOutOfRange` if `album_index` points past the snapshot,
    /// or `ValidationFailed` if `item_index` is set on an exhausted cursor
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.album_index > self.albums.len() {
            return Err(DomainError::CursorOutOfRange {
                album_index: self.album_index,
                album_count: self.albums.len(),
            });
        }
        if self.is_finished() && self.item_index != 0 {
            return Err(DomainError::ValidationFailed(format!(
                "item_index {} set on a finished generation",
                self.item_index
            )));
        }
        Ok(())
    }

    /// Returns true when the cursor has walked past the last album
    pub fn is_finished(&self) -> bool {
        self.album_index >= self.albums.len()
    }

    /// The album under the cursor
    pub fn current(&self) -> Option<&AlbumProgress> {
        self.albums.get(self.album_index)
    }

    pub fn current_mut(&mut self) -> Option<&mut AlbumProgress> {
        self.albums.get_mut(self.album_index)
    }

    /// Moves the cursor to the next item of the current album
    pub fn advance_item(&mut self) {
        self.item_index += 1;
    }

    /// Stores the album's summary, drops its caches and moves to the next album
    pub fn finish_album(&mut self, summary: AlbumSummary) {
        if let Some(progress) = self.albums.get_mut(self.album_index) {
            progress.summary = Some(summary);
            progress.clear_caches();
        }
        self.album_index += 1;
        self.item_index = 0;
    }

    /// Summaries of every published album, in generation order
    pub fn summaries(&self) -> Vec<AlbumSummary> {
        self.albums
            .iter()
            .filter_map(|p| p.summary.clone())
            .collect()
    }

    /// Returns true if the album at `index` has not been started yet
    fn not_started(&self, index: usize) -> bool {
        index > self.album_index || (index == self.album_index && self.item_index == 0)
    }

    /// Drops the caches of the given albums if they have not been started yet
    ///
    /// Returns the IDs of the albums that were invalidated.
    pub fn invalidate(&mut self, changed: &HashSet<AlbumId>) -> Vec<AlbumId> {
        let mut invalidated = Vec::new();
        for index in 0..self.albums.len() {
            if !self.not_started(index) {
                continue;
            }
            let progress = &mut self.albums[index];
            if changed.contains(progress.album.id()) {
                progress.clear_caches();
                invalidated.push(progress.album.id().clone());
            }
        }
        invalidated
    }

    /// Records the end of a run that leaves the generation open
    pub fn suspend(&mut self, status: RunStatus, counters: RunCounters, now: DateTime<Utc>) {
        self.run_status = status;
        self.counters = counters;
        self.last_run_at = now;
    }
}
