//! Blob store port (driven/secondary port)
//!
//! A flat namespace of named objects. The client performs no retries;
//! callers decide what to do with a failure.

use thiserror::Error;

/// Errors raised by a blob store adapter
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// Credentials or signature rejected (HTTP 401/403)
    #[error("Blob store rejected request ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// Any other non-2xx response
    #[error("Blob store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection failure or timeout
    #[error("Blob store network error: {0}")]
    Network(String),

    /// The request could not be signed (bad credentials format, clock)
    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl BlobStoreError {
    /// Returns true if the error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BlobStoreError::Unauthorized { .. } | BlobStoreError::Signing(_)
        )
    }

    /// HTTP status, if the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            BlobStoreError::Unauthorized { status, .. } | BlobStoreError::Status { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Port trait for the S3-compatible object store
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    /// Writes an object, optionally world-readable
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        is_public: bool,
    ) -> Result<(), BlobStoreError>;

    /// Reads an object; `None` if it does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobStoreError>;

    /// Deletes an object; deleting a missing object succeeds
    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;

    /// Probes for an object without downloading it
    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError>;

    /// Public URL under which the object is served
    fn public_url(&self, key: &str) -> String;
}
