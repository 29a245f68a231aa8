//! gallerysync Daemon - Background scheduler for album synchronization
//!
//! This binary runs as a systemd service and handles:
//! - One scheduler tick every `sync.poll_interval` seconds
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the Drive, S3 and SQLite adapters once, then enters a
//! loop that runs [`Scheduler::tick`] on an interval. The loop is controlled
//! by a `CancellationToken` that is triggered on receipt of SIGTERM or
//! SIGINT. A tick in progress is never interrupted; it stops at its own
//! budget and the signal is observed before the next one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gallerysync_cache::{DatabasePool, SqliteCheckpointStore};
use gallerysync_cloud::CloudAdapters;
use gallerysync_core::config::Config;
use gallerysync_sync::{RunBudget, Scheduler, SyncEngine, SyncError, TickOutcome};

/// Overrides the configuration file location
const ENV_CONFIG_PATH: &str = "GALLERYSYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Holds the wired scheduler and the shutdown token
struct DaemonService {
    config: Config,
    scheduler: Scheduler,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Validates `config` and wires adapters from it
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let adapters = CloudAdapters::from_config(&config)?;
        let pool = DatabasePool::new(&config.state.db_path)
            .await
            .context("Failed to open state database")?;
        let store = Arc::new(SqliteCheckpointStore::new(pool.pool().clone()));
        let engine = SyncEngine::new(
            adapters.source,
            adapters.blob_store,
            store,
            adapters.notifier,
            &config,
        )?;

        Ok(Self {
            config,
            scheduler: Scheduler::new(engine),
            shutdown,
        })
    }

    /// Ticks on the poll interval until shutdown
    ///
    /// The first tick fires immediately. Tick errors are logged and the loop
    /// keeps going; the failure tracker has already counted them.
    async fn run(&self) -> Result<()> {
        let poll_secs = self.config.sync.poll_interval;
        let budget = RunBudget::new(self.config.sync.budget());

        info!(
            collection = %self.scheduler.engine().collection(),
            poll_interval_secs = poll_secs,
            budget_secs = budget.wall_clock().as_secs(),
            "Starting scheduler loop"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(poll_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = interval.tick() => {}
            }

            self.tick(&budget).await;
        }

        info!("Scheduler loop terminated");
        Ok(())
    }

    async fn tick(&self, budget: &RunBudget) {
        match self.scheduler.tick(budget).await {
            Ok(TickOutcome::Heartbeat { entry, .. }) => {
                info!(version = entry.version, "No changes, version marker refreshed");
            }
            Ok(outcome) => {
                if let Some(result) = outcome.run_result() {
                    info!(
                        status = %result.status,
                        processed = result.items_processed,
                        uploaded = result.items_uploaded,
                        skipped = result.items_skipped,
                        failed = result.items_failed,
                        duration_ms = result.duration_ms,
                        "Tick finished"
                    );
                }
            }
            Err(SyncError::LeaseHeld { collection }) => {
                info!(%collection, "Another run holds the lease, skipping tick");
            }
            Err(e) => {
                error!(error = %e, "Tick failed");
            }
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn config_path() -> PathBuf {
    std::env::var_os(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

fn load_config(path: &std::path::Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        warn!(config_path = %path.display(), "No configuration file, using defaults");
        Config::default()
    };
    Ok(config.with_env_overrides())
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

fn init_tracing(level: &str, format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path();
    // Parse errors are reported once the subscriber is up
    let logging = Config::load_or_default(&config_path).logging;
    init_tracing(&logging.level, &logging.format);

    info!("gallerysync daemon starting (gallerysyncd)");
    let config = load_config(&config_path)?;
    info!(config_path = %config_path.display(), "Loaded configuration");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("gallerysync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "gallerysync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
