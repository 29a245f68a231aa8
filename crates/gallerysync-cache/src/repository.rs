//! SQLite implementation of ICheckpointStore
//!
//! Values live in a `properties` table keyed by string. Leases live in a
//! separate `leases` table; acquisition is a single conditional upsert so
//! two processes racing for the same lease cannot both win.
//!
//! ## Type Mapping
//!
//! | Value           | SQL Type | Strategy                         |
//! |-----------------|----------|----------------------------------|
//! | property value  | TEXT     | stored verbatim (JSON in practice) |
//! | updated_at      | TEXT     | ISO 8601 via `to_rfc3339()`      |
//! | lease expiry    | INTEGER  | Unix epoch milliseconds          |

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use gallerysync_core::ports::ICheckpointStore;

use crate::CacheError;

/// SQLite-based implementation of the checkpoint store port
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lists every stored key, sorted
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM properties ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    /// Returns the current holder of a lease, if it has not expired
    pub async fn lease_holder(&self, name: &str) -> Result<Option<String>, CacheError> {
        let now = Utc::now().timestamp_millis();
        let holder: Option<String> =
            sqlx::query_scalar("SELECT holder FROM leases WHERE name = ? AND expires_at > ?")
                .bind(name)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?;
        Ok(holder)
    }
}

#[async_trait::async_trait]
impl ICheckpointStore for SqliteCheckpointStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM properties WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(CacheError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO properties (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(key, bytes = value.len(), "Property stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM properties WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);

        // The update branch only fires for our own lease or an expired one
        let result = sqlx::query(
            "INSERT INTO leases (name, holder, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at
             WHERE leases.holder = excluded.holder OR leases.expires_at <= ?",
        )
        .bind(name)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let acquired = result.rows_affected() == 1;
        if acquired {
            tracing::debug!(lease = name, holder, ttl_ms, "Lease acquired");
        } else {
            tracing::debug!(lease = name, holder, "Lease held by another process");
        }
        Ok(acquired)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM leases WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        tracing::debug!(lease = name, holder, "Lease released");
        Ok(())
    }
}
