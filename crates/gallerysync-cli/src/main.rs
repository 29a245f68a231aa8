//! gallerysync CLI - Mirror Google Drive photo albums to S3-compatible storage
//!
//! Provides commands for:
//! - Running a budgeted, resumable sync
//! - Detecting source changes since the last generation
//! - One scheduler tick (for cron or a systemd timer)
//! - Inspecting and resetting the local sync state
//! - Viewing and validating configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gallerysync_core::config::Config;

mod commands;
mod context;
mod output;

use commands::{
    config::ConfigCommand, detect::DetectCommand, reset::ResetCommand, status::StatusCommand,
    sync::SyncCommand, tick::TickCommand,
};
use context::CliContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "gallerysync",
    version,
    about = "Resumable Google Drive album sync to S3-compatible storage"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one budgeted sync, resuming a paused generation if there is one
    Sync(SyncCommand),
    /// Report albums and items changed since the last generation
    Detect(DetectCommand),
    /// Resume, sync or heartbeat, whichever the collection needs
    Tick(TickCommand),
    /// Show checkpoint position, failure counter and watermark
    Status(StatusCommand),
    /// Discard the paused generation
    Reset(ResetCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Log filter for the given flags; `configured` is `logging.level`
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> String {
    if quiet {
        return "warn".to_string();
    }
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = CliContext::new(cli.config.as_deref());

    // Logs go to stderr so --json output stays parseable
    let logging = Config::load_or_default(ctx.config_path()).logging;
    let filter = log_filter(cli.verbose, cli.quiet, &logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx, format).await,
        Commands::Detect(cmd) => cmd.execute(&ctx, format).await,
        Commands::Tick(cmd) => cmd.execute(&ctx, format).await,
        Commands::Status(cmd) => cmd.execute(&ctx, format).await,
        Commands::Reset(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
    }
}
