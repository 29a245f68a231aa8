//! Source collection port (driven/secondary port)
//!
//! The source is a two-level hierarchy: albums (folders) containing items
//! (images). Listings are metadata only; bytes are fetched per variant.
//!
//! ## Design Notes
//!
//! - Errors are typed so the engine can tell a transient per-item failure
//!   from an authentication failure that must abort the run.
//! - `variant_url` is computed from the item ID alone, with no network call.

use thiserror::Error;

use crate::domain::album::{SourceAlbum, SourceItem};
use crate::domain::newtypes::{AlbumId, ItemId};
use crate::domain::variant::Variant;

/// Errors raised by a source collection adapter
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials rejected (HTTP 401/403)
    #[error("Source rejected credentials: {0}")]
    Unauthorized(String),

    /// Album or item disappeared
    #[error("Not found in source: {0}")]
    NotFound(String),

    /// Network failure, timeout or server error
    #[error("Transient source error: {0}")]
    Transient(String),

    /// Response could not be decoded
    #[error("Malformed source response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Returns true if the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Unauthorized(_))
    }
}

/// Port trait for the paginated source collection
#[async_trait::async_trait]
pub trait ISourceCollection: Send + Sync {
    /// Lists every album in a stable order (metadata only)
    async fn list_albums(&self) -> Result<Vec<SourceAlbum>, SourceError>;

    /// Lists the items of an album in source order
    ///
    /// Returns `SourceError::NotFound` if the album no longer exists.
    async fn list_items(&self, album: &AlbumId) -> Result<Vec<SourceItem>, SourceError>;

    /// Downloads the bytes of one rendition of an item
    async fn fetch_variant(
        &self,
        item: &SourceItem,
        variant: Variant,
    ) -> Result<Vec<u8>, SourceError>;

    /// View URL of an item at the given width
    fn variant_url(&self, item: &ItemId, width: u32) -> String;
}
