//! Failure tracker and alerter
//!
//! Counts consecutive run-level failures per collection in the checkpoint
//! store and sends one notification when the streak reaches the threshold.
//! A successful run clears the streak, which re-arms the alert.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use gallerysync_core::domain::FailureState;
use gallerysync_core::ports::{INotificationService, Notification};

use crate::state::StateRepository;
use crate::SyncError;

/// Upper bound on how long an alert delivery may hold up the caller
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct FailureTracker {
    state: StateRepository,
    notifier: Arc<dyn INotificationService>,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(
        state: StateRepository,
        notifier: Arc<dyn INotificationService>,
        threshold: u32,
    ) -> Self {
        Self {
            state,
            notifier,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Counts a run-level failure and returns the streak length
    pub async fn record_failure(&self, error: &str) -> Result<u32, SyncError> {
        let mut state = self.state.load_failures().await?;
        let should_alert = state.record(error, Utc::now(), self.threshold);
        self.state.save_failures(&state).await?;

        warn!(
            collection = %self.state.collection(),
            consecutive_failures = state.consecutive_failures,
            threshold = self.threshold,
            error,
            "Sync failure recorded"
        );

        if should_alert {
            self.alert(&state).await;
        }
        Ok(state.consecutive_failures)
    }

    /// Clears the streak after a successful run
    pub async fn record_success(&self) -> Result<(), SyncError> {
        let state = self.state.load_failures().await?;
        if state.is_clear() {
            return Ok(());
        }

        self.state.clear_failures().await?;
        info!(
            collection = %self.state.collection(),
            previous_failures = state.consecutive_failures,
            "Failure streak cleared"
        );
        Ok(())
    }

    pub async fn state(&self) -> Result<FailureState, SyncError> {
        self.state.load_failures().await
    }

    /// Delivers the alert; delivery problems are logged, never returned
    async fn alert(&self, state: &FailureState) {
        let collection = self.state.collection();
        let notification = Notification::error(
            format!("gallerysync: {collection} sync is failing"),
            format!(
                "The {collection} sync failed {} times in a row.\n\nLast error: {}\nLast failure: {}",
                state.consecutive_failures,
                state.last_error.as_deref().unwrap_or("unknown"),
                state
                    .last_failure_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
        )
        .with_category("sync-failure");

        match tokio::time::timeout(NOTIFY_TIMEOUT, self.notifier.notify(&notification)).await {
            Ok(Ok(())) => info!(%collection, "Failure alert sent"),
            Ok(Err(e)) => error!(%collection, error = %e, "Failed to deliver failure alert"),
            Err(_) => error!(%collection, "Failure alert delivery timed out"),
        }
    }
}
