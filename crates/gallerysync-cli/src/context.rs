//! Adapter wiring shared by the commands
//!
//! Commands that only read local state (`status`, `reset`) open the
//! checkpoint store alone; commands that talk to Drive or the bucket build
//! the full [`SyncEngine`] and fail early when a secret is missing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use gallerysync_cache::{DatabasePool, SqliteCheckpointStore};
use gallerysync_cloud::CloudAdapters;
use gallerysync_core::config::Config;
use gallerysync_sync::{Scheduler, StateRepository, SyncEngine};

/// Global options every command receives
#[derive(Debug, Clone)]
pub struct CliContext {
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config_override: Option<&str>) -> Self {
        let config_path = config_override
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_path);
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the configuration file with environment secrets applied
    ///
    /// A missing file yields the defaults; an unreadable one is an error.
    pub fn load_config(&self) -> Result<Config> {
        let config = if self.config_path.exists() {
            Config::load(&self.config_path).with_context(|| {
                format!("Failed to load configuration from {}", self.config_path.display())
            })?
        } else {
            debug!(
                config_path = %self.config_path.display(),
                "No configuration file, using defaults"
            );
            Config::default()
        };
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config.with_env_overrides())
    }

    /// Opens the checkpoint store named in `config`
    pub async fn open_store(&self, config: &Config) -> Result<Arc<SqliteCheckpointStore>> {
        let pool = DatabasePool::new(&config.state.db_path)
            .await
            .context("Failed to open state database")?;
        Ok(Arc::new(SqliteCheckpointStore::new(pool.pool().clone())))
    }

    /// Typed state access without any remote adapter
    pub async fn state(&self, config: &Config) -> Result<StateRepository> {
        let store = self.open_store(config).await?;
        Ok(StateRepository::new(store, config.collection_name()?))
    }

    /// Builds the engine over Drive, S3 and the configured alert channel
    ///
    /// The configuration is validated before the state database is opened.
    pub async fn engine(&self, config: &Config) -> Result<SyncEngine> {
        let adapters = CloudAdapters::from_config(config)?;
        let store = self.open_store(config).await?;
        SyncEngine::new(
            adapters.source,
            adapters.blob_store,
            store,
            adapters.notifier,
            config,
        )
    }

    pub async fn scheduler(&self, config: &Config) -> Result<Scheduler> {
        Ok(Scheduler::new(self.engine(config).await?))
    }
}
