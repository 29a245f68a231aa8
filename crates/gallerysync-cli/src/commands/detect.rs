//! Detect command - Report source changes since the last generation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use gallerysync_sync::ChangeReport;

use crate::context::CliContext;
use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct DetectCommand {
    /// Compare against this RFC 3339 instant instead of the stored watermark
    #[arg(long, value_parser = parse_rfc3339)]
    pub since: Option<DateTime<Utc>>,

    /// Drop cached listings of changed albums the paused generation has not
    /// reached yet
    #[arg(long)]
    pub invalidate: bool,
}

impl DetectCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = ctx.load_config()?;
        let scheduler = ctx.scheduler(&config).await?;

        let since = match self.since {
            Some(since) => since,
            None => match scheduler.engine().state().load_watermark().await? {
                Some(watermark) => watermark,
                None => {
                    formatter.warn(
                        "No generation has finished yet; pass --since or run `gallerysync sync`",
                    );
                    return Ok(());
                }
            },
        };

        let report = scheduler
            .detector()
            .detect_changes(since)
            .await
            .context("Change detection failed")?;

        let invalidated = if self.invalidate {
            Some(scheduler.detector().invalidate(&report).await?)
        } else {
            None
        };

        if format.is_json() {
            let mut json = serde_json::to_value(&report)?;
            if let Some(albums) = &invalidated {
                json["invalidated_album_ids"] = serde_json::to_value(albums)?;
            }
            formatter.print_json(&json);
            return Ok(());
        }

        print_report(formatter.as_ref(), &report);
        if let Some(albums) = invalidated {
            if albums.is_empty() {
                formatter.info("No cached listings to invalidate");
            } else {
                formatter.success(&format!(
                    "Invalidated {}",
                    plural(albums.len() as u64, "cached album listing")
                ));
            }
        }
        Ok(())
    }
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

/// Shared by `detect` and `tick`
pub fn print_report(formatter: &dyn OutputFormatter, report: &ChangeReport) {
    let since = report
        .since
        .map(|s| s.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());

    if !report.has_changes {
        formatter.success(&format!("No changes since {}", since));
        return;
    }

    formatter.success(&format!(
        "{} changed since {}",
        plural(report.changed_album_ids.len() as u64, "album"),
        since
    ));
    formatter.field("New items", &report.new_item_count.to_string());
    formatter.field("Modified", &report.modified_item_count.to_string());
    for album in &report.changed_album_ids {
        formatter.info(&format!("  - {}", album));
    }
}
