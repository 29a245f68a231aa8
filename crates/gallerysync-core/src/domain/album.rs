//! Source collection entities
//!
//! A `SourceAlbum` is a folder in the source collection and a `SourceItem` is
//! an image inside it. Both are owned by the source and read-only to the
//! engine; they are snapshotted into the checkpoint so a generation keeps a
//! stable view of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{AlbumId, ItemId};

// ============================================================================
// SourceAlbum
// ============================================================================

/// An album as listed by the source (metadata only, items are loaded lazily)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAlbum {
    id: AlbumId,
    name: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl SourceAlbum {
    /// Creates a new SourceAlbum
    pub fn new(
        id: AlbumId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            created_at,
            modified_at,
        }
    }

    /// Returns the album ID
    pub fn id(&self) -> &AlbumId {
        &self.id
    }

    /// Returns the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns when the album was created in the source
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the album was last modified in the source
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }
}

// ============================================================================
// SourceItem
// ============================================================================

/// An image inside an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    id: ItemId,
    name: String,
    size_bytes: u64,
    media_type: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl SourceItem {
    /// Creates a new SourceItem
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        size_bytes: u64,
        media_type: impl Into<String>,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            size_bytes,
            media_type: media_type.into(),
            created_at,
            modified_at,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// MIME type reported by the source (e.g. `image/png`)
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Returns true if the item appeared after `since`
    pub fn is_new_since(&self, since: DateTime<Utc>) -> bool {
        self.created_at > since
    }

    /// Returns true if an item that already existed at `since` changed after it
    pub fn is_modified_since(&self, since: DateTime<Utc>) -> bool {
        self.created_at <= since && self.modified_at > since
    }
}
