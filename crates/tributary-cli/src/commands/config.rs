//! Config command - View and validate Tributary configuration
//!
//! Provides the `tributary config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON), tokens redacted
//! 2. Validates the configuration file and reports every error

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;
use tributary_core::config::Config;

use super::config_path;
use crate::output::{get_formatter, plural, OutputFormat};

const REDACTED: &str = "<redacted>";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(format, config),
            ConfigCommand::Validate => execute_validate(format, config),
        }
    }
}

/// Copy of `config` safe to print
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    for instance in [&mut shown.source, &mut shown.destination] {
        if instance.access_token.is_some() {
            instance.access_token = Some(REDACTED.to_string());
        }
    }
    shown
}

fn execute_show(format: OutputFormat, explicit: Option<&Path>) -> Result<()> {
    let formatter = get_formatter(format);
    let path = config_path(explicit);
    let config = redacted(&Config::load_or_default(&path));

    info!(config_path = %path.display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(&config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(format: OutputFormat, explicit: Option<&Path>) -> Result<()> {
    let formatter = get_formatter(format);
    let path = config_path(explicit);

    if !path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": path.display().to_string(),
                "errors": ["Configuration file not found"],
            }));
        } else {
            formatter.error(&format!("Configuration file not found at {}", path.display()));
        }
        bail!("No configuration to validate");
    }

    let config = Config::load(&path)
        .with_context(|| format!("Failed to parse configuration at {}", path.display()))?;
    info!(config_path = %path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            plural(errors.len())
        ));
        formatter.info(&format!("File: {}", path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if !errors.is_empty() {
        bail!("Configuration is invalid");
    }
    Ok(())
}
