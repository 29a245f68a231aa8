//! Config command - Inspect the gallerysync configuration
//!
//! Provides the `gallerysync config` CLI command which:
//! 1. Shows the effective configuration (secrets masked)
//! 2. Validates the configuration file and reports every error
//! 3. Prints the configuration file path

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use gallerysync_core::config::{Config, ValidationError};

use crate::context::CliContext;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx, format),
            ConfigCommand::Validate => self.execute_validate(ctx, format),
            ConfigCommand::Path => self.execute_path(ctx, format),
        }
    }

    fn execute_show(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config = ctx.load_config()?.redacted();

        if format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path().display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let config_path = ctx.config_path();

        if !config_path.exists() {
            let message = format!("Configuration file not found at {}", config_path.display());
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
            }
            anyhow::bail!("configuration file missing");
        }

        let errors = match Config::load(config_path) {
            Ok(config) => config.with_env_overrides().validate(),
            Err(e) => vec![ValidationError {
                field: "(file)".to_string(),
                message: format!("Failed to parse configuration: {}", e),
            }],
        };

        info!(
            config_path = %config_path.display(),
            errors = errors.len(),
            "Validated configuration"
        );

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {}:",
                plural(errors.len() as u64, "error")
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("configuration is invalid")
        }
    }

    fn execute_path(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let path = ctx.config_path().display().to_string();
        if format.is_json() {
            get_formatter(format).print_json(&serde_json::json!({
                "config_path": path,
                "exists": ctx.config_path().exists(),
            }));
        } else {
            println!("{}", path);
        }
        Ok(())
    }
}
