//! Domain entities and business logic
//!
//! This module contains the core domain types for gallerysync:
//! - Newtypes for validated identifiers
//! - Source collection snapshots (albums and items)
//! - Size variants and the object key layout
//! - Published documents (album/gallery manifests, version marker, run log)
//! - Resume state (checkpoint) and failure bookkeeping

pub mod album;
pub mod checkpoint;
pub mod errors;
pub mod failure;
pub mod manifest;
pub mod newtypes;
pub mod variant;

// Re-export commonly used types
pub use album::{SourceAlbum, SourceItem};
pub use checkpoint::{AlbumProgress, Checkpoint, RunCounters, RunStatus};
pub use errors::DomainError;
pub use failure::FailureState;
pub use manifest::{
    AlbumManifest, AlbumSummary, GalleryManifest, ManifestItem, RemoteObjectRecord, RunLog,
    VersionEntry, VersionMarker,
};
pub use newtypes::{AlbumId, CollectionName, ItemId};
pub use variant::{ObjectLayout, Variant};
