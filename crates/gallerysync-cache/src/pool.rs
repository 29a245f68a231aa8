//! SQLite pool for the state database
//!
//! File databases run in WAL mode so `gallerysync status` can read while
//! `gallerysyncd` writes. The schema is applied on every open.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Writers wait this long for the other process's transaction
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool over the state database
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the state database at `db_path`
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or the file cannot be
    /// opened, `CacheError::MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to open state database {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::migrate(&pool).await?;
        tracing::info!(path = %db_path.display(), "State database ready");
        Ok(Self { pool })
    }

    /// Private in-memory database, for tests
    ///
    /// Limited to one connection: every connection would get its own database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to open in-memory database: {}", e))
            })?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(include_str!("migrations/20261016_initial.sql"))
            .execute(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("Failed to apply schema: {}", e)))?;
        tracing::debug!("State schema applied");
        Ok(())
    }
}
