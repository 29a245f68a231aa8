//! Tick command - One scheduler step, meant for cron or a systemd timer
//!
//! Resumes a paused generation, or detects changes and either starts a new
//! generation or refreshes the version marker. A held lease is reported and
//! exits successfully so overlapping timers stay quiet.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use gallerysync_sync::{RunBudget, SyncError, TickOutcome};

use crate::commands::detect::print_report;
use crate::commands::sync::print_run_result;
use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct TickCommand {
    /// Wall-clock budget in seconds (defaults to sync.budget_secs)
    #[arg(long)]
    pub budget_secs: Option<u64>,
}

impl TickCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = ctx.load_config()?;
        let scheduler = ctx.scheduler(&config).await?;

        let wall_clock = self
            .budget_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.sync.budget());

        let outcome = match scheduler.tick(&RunBudget::new(wall_clock)).await {
            Ok(outcome) => outcome,
            Err(SyncError::LeaseHeld { collection }) => {
                info!(%collection, "Another run holds the lease, skipping tick");
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "action": "skipped",
                        "reason": "lease_held",
                    }));
                } else {
                    formatter.warn(&format!(
                        "A sync of '{}' is already running, nothing to do",
                        collection
                    ));
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if format.is_json() {
            formatter.print_json(&outcome_json(&outcome)?);
            return Ok(());
        }

        match &outcome {
            TickOutcome::Resumed(result) => {
                formatter.info("Resumed the paused generation");
                print_run_result(formatter.as_ref(), format, result);
            }
            TickOutcome::Synced { report, result } => {
                match report {
                    Some(report) => print_report(formatter.as_ref(), report),
                    None => formatter.info("Starting the first generation"),
                }
                print_run_result(formatter.as_ref(), format, result);
            }
            TickOutcome::Heartbeat { report, entry } => {
                print_report(formatter.as_ref(), report);
                formatter.field("Version", &entry.version.to_string());
                formatter.field("Checked at", &entry.checked_at.to_rfc3339());
            }
        }
        Ok(())
    }
}

fn outcome_json(outcome: &TickOutcome) -> Result<serde_json::Value> {
    Ok(match outcome {
        TickOutcome::Resumed(result) => serde_json::json!({
            "action": "resumed",
            "result": result,
        }),
        TickOutcome::Synced { report, result } => serde_json::json!({
            "action": "synced",
            "changes": report,
            "result": result,
        }),
        TickOutcome::Heartbeat { report, entry } => serde_json::json!({
            "action": "heartbeat",
            "changes": report,
            "version": serde_json::to_value(entry)?,
        }),
    })
}
