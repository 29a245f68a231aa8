//! Published documents
//!
//! Everything in this module is written to the blob store as JSON and read
//! by the web frontend, so the wire shape uses camelCase keys. The album
//! manifest doubles as the durable copy of the per-item remote records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::album::{SourceAlbum, SourceItem};
use super::checkpoint::{RunCounters, RunStatus};
use super::newtypes::{AlbumId, CollectionName, ItemId};

/// Variant name → public URL
pub type UrlMap = BTreeMap<String, String>;

// ============================================================================
// RemoteObjectRecord
// ============================================================================

/// What the blob store is known to hold for one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObjectRecord {
    /// Variants confirmed present, keyed by variant name
    #[serde(default)]
    pub urls: UrlMap,
    /// All required variants are present
    #[serde(default)]
    pub complete: bool,
    /// Failed upload attempts since the record was last reset
    #[serde(default)]
    pub attempts: u32,
}

impl RemoteObjectRecord {
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Records a variant as present
    pub fn set_url(&mut self, variant: impl Into<String>, url: impl Into<String>) {
        self.urls.insert(variant.into(), url.into());
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Bumps the attempt counter after a failed upload
    pub fn record_failed_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Returns true once `max_attempts` failed uploads have been recorded
    pub fn attempts_exhausted(&self, max_attempts: Option<u32>) -> bool {
        match max_attempts {
            Some(max) => !self.complete && self.attempts >= max,
            None => false,
        }
    }
}

// ============================================================================
// AlbumManifest
// ============================================================================

/// One entry of an album manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: ItemId,
    pub name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub urls: UrlMap,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub attempts: u32,
}

/// Per-album document at `gallery/albums/{albumId}.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumManifest {
    pub id: AlbumId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<ManifestItem>,
}

impl AlbumManifest {
    /// Builds the manifest for an album from its items in source order
    ///
    /// Items without a record are published as incomplete with no URLs.
    pub fn build(
        album: &SourceAlbum,
        items: &[SourceItem],
        records: &BTreeMap<ItemId, RemoteObjectRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let items = items
            .iter()
            .map(|item| {
                let record = records.get(item.id()).cloned().unwrap_or_default();
                ManifestItem {
                    id: item.id().clone(),
                    name: item.name().to_string(),
                    media_type: item.media_type().to_string(),
                    size_bytes: item.size_bytes(),
                    created_at: item.created_at(),
                    urls: record.urls,
                    complete: record.complete,
                    attempts: record.attempts,
                }
            })
            .collect();

        Self {
            id: album.id().clone(),
            name: album.name().to_string(),
            created_at: album.created_at(),
            modified_at: album.modified_at(),
            updated_at: now,
            items,
        }
    }

    /// Extracts the remote records this manifest vouches for
    pub fn records(&self) -> BTreeMap<ItemId, RemoteObjectRecord> {
        self.items
            .iter()
            .map(|item| {
                (
                    item.id.clone(),
                    RemoteObjectRecord {
                        urls: item.urls.clone(),
                        complete: item.complete,
                        attempts: item.attempts,
                    },
                )
            })
            .collect()
    }

    /// Number of items not yet fully published
    pub fn incomplete_count(&self) -> usize {
        self.items.iter().filter(|i| !i.complete).count()
    }

    /// Summary entry for the gallery index
    pub fn summary(&self) -> AlbumSummary {
        AlbumSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
            item_count: self.items.len(),
            cover: self
                .items
                .iter()
                .find(|i| i.complete)
                .map(|i| i.urls.clone()),
        }
    }
}

// ============================================================================
// GalleryManifest
// ============================================================================

/// Album entry of the gallery index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub id: AlbumId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub item_count: usize,
    /// URLs of the first complete item, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<UrlMap>,
}

/// Top-level index at `gallery/albums.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryManifest {
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub albums: Vec<AlbumSummary>,
}

impl GalleryManifest {
    /// Builds the index, omitting empty albums
    pub fn build(
        summaries: impl IntoIterator<Item = AlbumSummary>,
        version: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            updated_at: now,
            version,
            albums: summaries
                .into_iter()
                .filter(|s| s.item_count > 0)
                .collect(),
        }
    }

    /// Total number of items across all albums
    pub fn item_count(&self) -> usize {
        self.albums.iter().map(|a| a.item_count).sum()
    }
}

// ============================================================================
// VersionMarker
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    /// Logical millisecond timestamp, never decreases
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
}

/// Shared document at `metadata/version.json`, one entry per collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMarker {
    entries: BTreeMap<String, VersionEntry>,
}

impl VersionMarker {
    pub fn get(&self, collection: &CollectionName) -> Option<&VersionEntry> {
        self.entries.get(collection.as_str())
    }

    /// Advances the collection's version and returns it
    ///
    /// The new version is `max(now_ms, previous + 1)` so it stays monotonic
    /// even if the clock goes backwards.
    pub fn advance(&mut self, collection: &CollectionName, now: DateTime<Utc>) -> i64 {
        let now_ms = now.timestamp_millis();
        let version = match self.entries.get(collection.as_str()) {
            Some(prev) => now_ms.max(prev.version.saturating_add(1)),
            None => now_ms,
        };
        self.entries.insert(
            collection.as_str().to_string(),
            VersionEntry {
                version,
                updated_at: now,
                checked_at: now,
            },
        );
        version
    }

    /// Refreshes only `checked_at`; creates the entry if it is missing
    pub fn heartbeat(&mut self, collection: &CollectionName, now: DateTime<Utc>) {
        match self.entries.get_mut(collection.as_str()) {
            Some(entry) => entry.checked_at = now,
            None => {
                self.advance(collection, now);
            }
        }
    }
}

// ============================================================================
// RunLog
// ============================================================================

/// Outcome of one run, written to `logs/{collection}-sync-{date}.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    pub collection: CollectionName,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub counters: RunCounters,
    #[serde(default)]
    pub errors: Vec<String>,
}
