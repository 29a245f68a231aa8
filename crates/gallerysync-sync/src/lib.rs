//! gallerysync Sync - Resumable album synchronization
//!
//! Provides:
//! - A budgeted, resumable sync engine (source albums to blob store)
//! - Change detection against a watermark
//! - Consecutive failure tracking with a one-shot alert
//! - The scheduler tick that chooses between them
//!
//! ## Modules
//!
//! - [`budget`] - Wall-clock and item budgets for one invocation
//! - [`engine`] - The sync engine and its run result
//! - [`detector`] - Change detection, checkpoint invalidation, heartbeat
//! - [`failure`] - Failure tracker and alerter
//! - [`publisher`] - Manifests, version marker and run logs in the blob store
//! - [`scheduler`] - One scheduler tick
//! - [`state`] - Typed access to the checkpoint store

pub mod budget;
pub mod detector;
pub mod engine;
pub mod failure;
pub mod publisher;
pub mod scheduler;
pub mod state;

pub use budget::RunBudget;
pub use detector::{ChangeDetector, ChangeReport};
pub use engine::{RunResult, SyncEngine};
pub use failure::FailureTracker;
pub use publisher::Publisher;
pub use scheduler::{Scheduler, TickOutcome};
pub use state::{CollectionStatus, StateRepository};

use thiserror::Error;

use gallerysync_core::domain::DomainError;
use gallerysync_core::ports::{BlobStoreError, SourceError};

/// Errors that abort a sync operation
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source collection failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The blob store failed
    #[error("Blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    /// A published document could not be parsed
    #[error("Malformed manifest {key}: {reason}")]
    MalformedManifest { key: String, reason: String },

    /// Another process holds the collection's lease
    #[error("A sync of collection '{collection}' is already running")]
    LeaseHeld { collection: String },

    /// The checkpoint store failed or holds unreadable state
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    /// A domain-level error propagated from gallerysync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    /// Returns true for errors that must stop the whole run
    ///
    /// Per-item source and blob store failures are not fatal unless they are
    /// authentication or signing failures; everything else is.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Source(e) => e.is_fatal(),
            SyncError::BlobStore(e) => e.is_fatal(),
            _ => true,
        }
    }
}
