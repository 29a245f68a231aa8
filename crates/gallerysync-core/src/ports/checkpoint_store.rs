//! Checkpoint store port (driven/secondary port)
//!
//! A small persistent key-value property bag. Values are opaque strings
//! (JSON documents in practice). Leases give overlapping invocations a way
//! to exclude each other from a collection's checkpoint slot.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - A lease is held by `holder` until `ttl` elapses or it is released.
//!   Acquiring an expired lease, or re-acquiring one's own, succeeds.

use std::time::Duration;

/// Port trait for durable checkpoint storage
#[async_trait::async_trait]
pub trait ICheckpointStore: Send + Sync {
    /// Reads a value
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Writes (or overwrites) a value
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Removes a value; removing a missing key succeeds
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Tries to claim the named lease for `holder`
    ///
    /// Returns `false` if another holder owns an unexpired lease.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool>;

    /// Releases the lease if `holder` owns it
    async fn release_lease(&self, name: &str, holder: &str) -> anyhow::Result<()>;
}
