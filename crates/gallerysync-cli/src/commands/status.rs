//! Status command - Show the local sync state of the collection
//!
//! Reads only the checkpoint store, so it works without any credentials.

use anyhow::Result;
use clap::Args;

use gallerysync_sync::CollectionStatus;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = ctx.load_config()?;
        let status = ctx.state(&config).await?.status().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&status)?);
        } else {
            print_status(formatter.as_ref(), &status);
        }
        Ok(())
    }
}

fn print_status(formatter: &dyn OutputFormatter, status: &CollectionStatus) {
    formatter.success(&format!("Collection '{}'", status.collection));

    let last_generation = status
        .watermark
        .map(|w| w.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    formatter.field("Watermark", &last_generation);

    match &status.checkpoint {
        Some(cp) => {
            formatter.field("State", &format!("{} generation in progress", cp.run_status));
            formatter.field(
                "Position",
                &format!(
                    "album {}/{}, item {}{}",
                    (cp.album_index + 1).min(cp.album_count),
                    cp.album_count,
                    cp.item_index,
                    cp.current_album
                        .as_deref()
                        .map(|name| format!(" ({})", name))
                        .unwrap_or_default()
                ),
            );
            formatter.field("Started", &cp.generation_started_at.to_rfc3339());
            formatter.field("Last run", &cp.last_run_at.to_rfc3339());
            formatter.field(
                "Items",
                &format!(
                    "{} processed, {} uploaded, {} skipped, {} failed",
                    cp.totals.items_processed,
                    cp.totals.items_uploaded,
                    cp.totals.items_skipped,
                    cp.totals.items_failed
                ),
            );
        }
        None => formatter.field("State", "idle"),
    }

    let failures = &status.failures;
    if failures.is_clear() {
        formatter.field("Failures", "none");
        return;
    }
    formatter.field(
        "Failures",
        &format!(
            "{} in a row{}",
            failures.consecutive_failures,
            if failures.alerted { " (alert sent)" } else { "" }
        ),
    );
    if let Some(at) = failures.last_failure_at {
        formatter.field("Last failure", &at.to_rfc3339());
    }
    if let Some(err) = &failures.last_error {
        formatter.field("Last error", err);
    }
}
