//! Domain error types
//!
//! Validation failures for identifiers and invalid checkpoint transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid album identifier
    #[error("Invalid album ID: {0}")]
    InvalidAlbumId(String),

    /// Invalid item identifier
    #[error("Invalid item ID: {0}")]
    InvalidItemId(String),

    /// Invalid collection name
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    /// Invalid variant name
    #[error("Invalid variant: {0}")]
    InvalidVariant(String),

    /// The checkpoint cursor points outside the album snapshot
    #[error("Checkpoint cursor out of range: album {album_index} of {album_count}")]
    CursorOutOfRange {
        /// The offending album index
        album_index: usize,
        /// Number of albums in the snapshot
        album_count: usize,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
