//! Gallerysync Cache - Local checkpoint persistence
//!
//! SQLite-based storage for:
//! - Resume checkpoints
//! - Failure counters and change-detection watermarks
//! - Run leases
//!
//! ## Architecture
//!
//! This crate implements the `ICheckpointStore` port from `gallerysync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use gallerysync_cache::{DatabasePool, SqliteCheckpointStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/gallerysync/state.db")).await?;
//! let store = SqliteCheckpointStore::new(pool.pool().clone());
//! // Use store as ICheckpointStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteCheckpointStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
