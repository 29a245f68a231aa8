//! Scheduler tick
//!
//! One tick is what an external timer (cron, a systemd timer or the daemon
//! loop) invokes. It decides what the collection needs:
//!
//! ```text
//! checkpoint present ──────────────→ resume run_sync
//! no watermark yet ────────────────→ run_sync (first generation)
//! detect_changes(watermark) ─ yes ─→ run_sync
//!                           └─ no ──→ heartbeat
//! ```

use tracing::{debug, info, warn};

use gallerysync_core::domain::VersionEntry;

use crate::budget::RunBudget;
use crate::detector::{ChangeDetector, ChangeReport};
use crate::engine::{RunResult, SyncEngine};
use crate::SyncError;

/// What a tick did
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Continued a paused generation
    Resumed(RunResult),
    /// Started a generation, after detecting changes unless this was the
    /// first one
    Synced {
        report: Option<ChangeReport>,
        result: RunResult,
    },
    /// Nothing changed; the version marker was refreshed
    Heartbeat {
        report: ChangeReport,
        entry: VersionEntry,
    },
}

impl TickOutcome {
    pub fn run_result(&self) -> Option<&RunResult> {
        match self {
            TickOutcome::Resumed(result) | TickOutcome::Synced { result, .. } => Some(result),
            TickOutcome::Heartbeat { .. } => None,
        }
    }
}

pub struct Scheduler {
    engine: SyncEngine,
    detector: ChangeDetector,
}

impl Scheduler {
    pub fn new(engine: SyncEngine) -> Self {
        let detector = ChangeDetector::new(
            engine.source().clone(),
            engine.state().clone(),
            engine.publisher().clone(),
        );
        Self { engine, detector }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Runs one tick within `budget`
    #[tracing::instrument(skip(self, budget), fields(collection = %self.engine.collection()))]
    pub async fn tick(&self, budget: &RunBudget) -> Result<TickOutcome, SyncError> {
        let state = self.engine.state();

        if state.load_checkpoint().await?.is_some() {
            info!("Paused generation found, resuming");
            let result = self.engine.run_sync(budget).await?;
            return Ok(TickOutcome::Resumed(result));
        }

        let Some(watermark) = state.load_watermark().await? else {
            info!("No finished generation yet, starting the first one");
            let result = self.engine.run_sync(budget).await?;
            return Ok(TickOutcome::Synced {
                report: None,
                result,
            });
        };

        let report = match self.detector.detect_changes(watermark).await {
            Ok(report) => report,
            Err(err) => return Err(self.failed(err).await),
        };

        if report.has_changes {
            let result = self.engine.run_sync(budget).await?;
            return Ok(TickOutcome::Synced {
                report: Some(report),
                result,
            });
        }

        let entry = match self.detector.heartbeat().await {
            Ok(entry) => entry,
            Err(err) => return Err(self.failed(err).await),
        };
        self.engine.failure_tracker().record_success().await?;
        debug!(version = entry.version, "No changes since last generation");
        Ok(TickOutcome::Heartbeat { report, entry })
    }

    /// Counts a failure that happened outside `run_sync`
    async fn failed(&self, err: SyncError) -> SyncError {
        if let Err(e) = self
            .engine
            .failure_tracker()
            .record_failure(&err.to_string())
            .await
        {
            warn!(error = %e, "Failed to record tick failure");
        }
        err
    }
}
