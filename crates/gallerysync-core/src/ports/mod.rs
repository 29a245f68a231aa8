//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ISourceCollection`] - Album/item listing and byte download (Google Drive)
//! - [`IBlobStore`] - Object storage (S3-compatible)
//! - [`ICheckpointStore`] - Key-value property bag with leases (SQLite)
//! - [`INotificationService`] - Fire-and-forget alerts (email, log)

pub mod blob_store;
pub mod checkpoint_store;
pub mod notification;
pub mod source_collection;

pub use blob_store::{BlobStoreError, IBlobStore};
pub use checkpoint_store::ICheckpointStore;
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use source_collection::{ISourceCollection, SourceError};
