//! Sync command - Run one budgeted sync of the collection
//!
//! Provides the `gallerysync sync` CLI command which:
//! 1. Loads configuration and wires the Drive, S3 and SQLite adapters
//! 2. Runs the engine within the configured (or overridden) budget
//! 3. Displays the run result; a failed run exits non-zero

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use gallerysync_core::config::Config;
use gallerysync_core::domain::RunStatus;
use gallerysync_sync::{RunBudget, RunResult};

use crate::context::CliContext;
use crate::output::{format_duration_ms, get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Wall-clock budget in seconds (defaults to sync.budget_secs)
    #[arg(long)]
    pub budget_secs: Option<u64>,

    /// Stop after this many items
    #[arg(long)]
    pub max_items: Option<u64>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = ctx.load_config()?;
        let engine = ctx.engine(&config).await?;

        let budget = self.budget(&config);
        info!(
            budget_secs = budget.wall_clock().as_secs(),
            max_items = ?budget.max_items(),
            "Starting sync"
        );
        formatter.info(&format!("Syncing collection '{}'...", engine.collection()));

        let result = engine.run_sync(&budget).await?;
        print_run_result(formatter.as_ref(), format, &result);
        Ok(())
    }

    /// The run budget from the flags, falling back to the configuration
    pub fn budget(&self, config: &Config) -> RunBudget {
        let wall_clock = self
            .budget_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.sync.budget());
        let budget = RunBudget::new(wall_clock);
        match self.max_items {
            Some(max) => budget.with_max_items(max),
            None => budget,
        }
    }
}

/// Shared by `sync` and `tick`
pub fn print_run_result(formatter: &dyn OutputFormatter, format: OutputFormat, result: &RunResult) {
    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "status": result.status,
            "items_processed": result.items_processed,
            "items_uploaded": result.items_uploaded,
            "items_skipped": result.items_skipped,
            "items_failed": result.items_failed,
            "errors": result.errors,
            "duration_ms": result.duration_ms,
        }));
        return;
    }

    let duration = format_duration_ms(result.duration_ms);
    match result.status {
        RunStatus::Complete if result.items_uploaded == 0 => {
            formatter.success(&format!("Already up to date ({})", duration))
        }
        RunStatus::Complete => formatter.success(&format!("Generation complete in {}", duration)),
        RunStatus::Paused => formatter.success(&format!(
            "Budget used up after {}, run again to continue",
            duration
        )),
        RunStatus::Partial => formatter.warn(&format!(
            "Generation finished with {} in {}",
            plural(result.items_failed, "failed item"),
            duration
        )),
    }

    formatter.field("Processed", &result.items_processed.to_string());
    formatter.field("Uploaded", &result.items_uploaded.to_string());
    formatter.field("Skipped", &result.items_skipped.to_string());
    if result.items_failed > 0 {
        formatter.field("Failed", &result.items_failed.to_string());
    }

    if !result.errors.is_empty() {
        formatter.info("");
        formatter.info("Errors:");
        for err in &result.errors {
            formatter.info(&format!("  - {}", err));
        }
    }
}
