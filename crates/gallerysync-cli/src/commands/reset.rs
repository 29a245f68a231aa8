//! Reset command - Discard the paused generation
//!
//! The next run starts a fresh generation at the first album. Published
//! manifests and objects stay in the bucket, so already uploaded variants
//! are found by the existence probes instead of being uploaded again.

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Also clear the consecutive failure counter
    #[arg(long)]
    pub failures: bool,
}

impl ResetCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = ctx.load_config()?;
        let state = ctx.state(&config).await?;

        // Keep a running sync from writing its checkpoint back afterwards
        let holder = format!("pid{}-reset", std::process::id());
        state.acquire_lease(&holder, config.sync.lease_ttl()).await?;

        // An unreadable checkpoint counts; clearing it is the point of reset
        let had_checkpoint = !matches!(state.load_checkpoint().await, Ok(None));
        let cleared = async {
            state.clear_checkpoint().await?;
            if self.failures {
                state.clear_failures().await?;
            }
            Ok::<_, gallerysync_sync::SyncError>(())
        }
        .await;
        state.release_lease(&holder).await?;
        cleared?;

        info!(
            collection = %state.collection(),
            had_checkpoint,
            failures = self.failures,
            "State reset"
        );

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "collection": state.collection(),
                "checkpoint_cleared": had_checkpoint,
                "failures_cleared": self.failures,
            }));
        } else {
            if had_checkpoint {
                formatter.success("Paused generation discarded");
            } else {
                formatter.success("No paused generation");
            }
            if self.failures {
                formatter.success("Failure counter cleared");
            }
        }
        Ok(())
    }
}
