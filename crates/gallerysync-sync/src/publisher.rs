//! Documents published to the blob store
//!
//! Manifests and the version marker are public JSON read by the web
//! frontend. Run logs are private. Reads of published documents
//! distinguish a missing document (`None`) from one that exists but cannot
//! be parsed, which is reported as [`SyncError::MalformedManifest`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use gallerysync_core::domain::{
    AlbumId, AlbumManifest, AlbumSummary, CollectionName, GalleryManifest, ObjectLayout, RunLog,
    VersionEntry, VersionMarker,
};
use gallerysync_core::ports::IBlobStore;

use crate::SyncError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Reads and writes the published documents of one collection
#[derive(Clone)]
pub struct Publisher {
    blob_store: Arc<dyn IBlobStore>,
    collection: CollectionName,
}

impl Publisher {
    pub fn new(blob_store: Arc<dyn IBlobStore>, collection: CollectionName) -> Self {
        Self {
            blob_store,
            collection,
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SyncError> {
        let Some(bytes) = self.blob_store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SyncError::MalformedManifest {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        is_public: bool,
    ) -> Result<(), SyncError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| anyhow::anyhow!("Failed to encode {key}: {e}"))?;
        self.blob_store
            .put(key, bytes, JSON_CONTENT_TYPE, is_public)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Album manifests
    // ========================================================================

    pub async fn load_album_manifest(
        &self,
        album: &AlbumId,
    ) -> Result<Option<AlbumManifest>, SyncError> {
        self.read_json(&ObjectLayout::album_manifest_key(album))
            .await
    }

    pub async fn publish_album(&self, manifest: &AlbumManifest) -> Result<AlbumSummary, SyncError> {
        let key = ObjectLayout::album_manifest_key(&manifest.id);
        self.write_json(&key, manifest, true).await?;

        info!(
            album = %manifest.id,
            items = manifest.items.len(),
            incomplete = manifest.incomplete_count(),
            "Album manifest published"
        );
        Ok(manifest.summary())
    }

    /// Removes the manifest of an album that no longer has items
    pub async fn delete_album_manifest(&self, album: &AlbumId) -> Result<(), SyncError> {
        self.blob_store
            .delete(&ObjectLayout::album_manifest_key(album))
            .await?;
        debug!(%album, "Stale album manifest deleted");
        Ok(())
    }

    // ========================================================================
    // Gallery manifest and version marker
    // ========================================================================

    pub async fn load_gallery(&self) -> Result<Option<GalleryManifest>, SyncError> {
        self.read_json(ObjectLayout::gallery_manifest_key()).await
    }

    pub async fn load_version_marker(&self) -> Result<VersionMarker, SyncError> {
        Ok(self
            .read_json(ObjectLayout::version_marker_key())
            .await?
            .unwrap_or_default())
    }

    /// Publishes the gallery index and advances the collection's version
    ///
    /// The index is written before the marker, so a reader that sees the new
    /// version always finds the matching index.
    pub async fn publish_gallery(
        &self,
        summaries: Vec<AlbumSummary>,
        now: DateTime<Utc>,
    ) -> Result<GalleryManifest, SyncError> {
        let mut marker = self.load_version_marker().await?;
        let version = marker.advance(&self.collection, now);

        let gallery = GalleryManifest::build(summaries, version, now);
        self.write_json(ObjectLayout::gallery_manifest_key(), &gallery, true)
            .await?;
        self.write_json(ObjectLayout::version_marker_key(), &marker, true)
            .await?;

        info!(
            version,
            albums = gallery.albums.len(),
            items = gallery.item_count(),
            "Gallery manifest published"
        );
        Ok(gallery)
    }

    /// Refreshes `checked_at` of the collection's version entry
    pub async fn heartbeat(&self, now: DateTime<Utc>) -> Result<VersionEntry, SyncError> {
        let mut marker = self.load_version_marker().await?;
        marker.heartbeat(&self.collection, now);
        self.write_json(ObjectLayout::version_marker_key(), &marker, true)
            .await?;

        let entry = marker
            .get(&self.collection)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Version entry missing after heartbeat"))?;
        debug!(version = entry.version, "Heartbeat written");
        Ok(entry)
    }

    // ========================================================================
    // Run logs
    // ========================================================================

    pub async fn write_run_log(&self, log: &RunLog) -> Result<(), SyncError> {
        let key = ObjectLayout::run_log_key(&self.collection, log.finished_at.date_naive());
        self.write_json(&key, log, false).await
    }
}
