//! Sync command - Reconcile the source instance into the destination
//!
//! Provides the `tributary sync` CLI command which:
//! 1. Loads configuration and applies the command-line switches on top
//! 2. Connects to both instances
//! 3. Runs the SyncEngine, asking before an unsupported migration
//! 4. Prints the dry-run diff or the run summary, then the homework

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use inquire::Confirm;
use tracing::{info, warn};
use tributary_core::config::Config;
use tributary_core::domain::kind::parse_kind_list;
use tributary_sync::{Preflight, SyncEngine, SyncReport};

use super::{connect, load_config};
use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Report what would change without changing anything
    #[arg(long, conflicts_with = "apply")]
    pub dry_run: bool,

    /// Apply changes to the destination
    #[arg(long)]
    pub apply: bool,

    /// Leave package installation as homework
    #[arg(long)]
    pub offline: bool,

    /// Update reports that already exist on the destination
    #[arg(long)]
    pub update_reports: bool,

    /// Update dashboards that already exist on the destination
    #[arg(long)]
    pub update_dashboards: bool,

    /// Also update reports named "Default"
    #[arg(long)]
    pub update_default_reports: bool,

    /// Log remote failures and carry on
    #[arg(long)]
    pub continue_on_error: bool,

    /// Make destination application fields match the source exactly
    #[arg(long)]
    pub mirror_app_fields: bool,

    /// Allow migrating between differing platform versions
    #[arg(long)]
    pub use_unsupported_version: bool,

    /// Do not ask before an unsupported migration
    #[arg(long, requires = "use_unsupported_version")]
    pub force_unsupported_version: bool,

    /// Archive every payload read and written below DIR
    #[arg(long, value_name = "DIR")]
    pub dump_content: Option<PathBuf>,

    /// Only reconcile the named object (repeatable)
    #[arg(long, value_name = "KIND=NAME", conflicts_with = "exclude")]
    pub include: Vec<String>,

    /// Never reconcile the named object (repeatable)
    #[arg(long, value_name = "KIND=NAME")]
    pub exclude: Vec<String>,

    /// Comma-separated kinds to reconcile, e.g. "tasks,applications"
    #[arg(long, value_name = "KINDS")]
    pub components: Option<String>,
}

impl SyncCommand {
    /// Layer the command-line switches over the loaded configuration.
    ///
    /// Switches only ever turn options on; `--dry-run` and `--apply` pick
    /// the mode explicitly.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        let sync = &mut config.sync;
        if self.dry_run {
            sync.dry_run = true;
        }
        if self.apply {
            sync.dry_run = false;
        }
        sync.offline |= self.offline;
        sync.update_reports |= self.update_reports;
        sync.update_dashboards |= self.update_dashboards;
        sync.update_default_reports |= self.update_default_reports;
        sync.continue_on_error |= self.continue_on_error;
        sync.mirror_app_fields |= self.mirror_app_fields;
        sync.use_unsupported_version |= self.use_unsupported_version;
        sync.force_unsupported_version |= self.force_unsupported_version;
        if let Some(kinds) = &self.components {
            sync.components = parse_kind_list(kinds).context("Invalid --components")?;
        }
        if !self.include.is_empty() {
            sync.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            sync.exclude = self.exclude.clone();
        }
        if let Some(dir) = &self.dump_content {
            config.audit.dump_content_path = Some(dir.clone());
        }
        Ok(())
    }

    pub async fn execute(&self, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);

        let mut config = load_config(config_path)?;
        self.apply_to(&mut config)?;
        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            bail!("Configuration has {} error{}", errors.len(), plural(errors.len()));
        }

        let source = connect("source", &config.source)?;
        let destination = connect("destination", &config.destination)?;
        let engine = SyncEngine::new(source, destination, &config)?;

        if engine.settings().dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }
        info!(
            source = %config.source.host,
            destination = %config.destination.host,
            "Starting sync"
        );

        let interactive = !format.is_json();
        let report = tokio::select! {
            result = engine.run(|preflight| confirm(preflight, interactive)) => result?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                bail!("Interrupted; run artifacts were flushed");
            }
        };

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else {
            print_report(formatter.as_ref(), &report);
        }
        Ok(())
    }
}

/// Ask whether to migrate an older source into a newer destination
fn confirm(preflight: &Preflight, interactive: bool) -> bool {
    if !interactive {
        warn!("Unsupported migration needs confirmation; pass --force-unsupported-version");
        return false;
    }
    Confirm::new(&format!(
        "Migrate from {} to {}? This combination is not supported.",
        preflight.source_version, preflight.destination_version
    ))
    .with_default(false)
    .with_help_message("Pass --force-unsupported-version to skip this question")
    .prompt()
    .unwrap_or(false)
}

fn print_report(formatter: &dyn OutputFormatter, report: &SyncReport) {
    if report.dry_run {
        if report.diff.is_empty() {
            formatter.success("Already up to date");
        } else {
            formatter.success(&format!(
                "{} change{} would be made:",
                report.diff.len(),
                plural(report.diff.len())
            ));
            for line in report.render_diff() {
                formatter.info(&line);
            }
        }
    } else {
        formatter.success(&report.summary());
    }

    if report.errors > 0 {
        formatter.warn(&format!(
            "{} remote call{} failed and {} skipped",
            report.errors,
            plural(report.errors),
            if report.errors == 1 { "was" } else { "were" }
        ));
    }
    if let Some(archive) = &report.archive {
        formatter.info(&format!("Run artifacts: {}", archive.display()));
    }

    if !report.homework.is_empty() {
        formatter.info("");
        formatter.warn(&format!(
            "{} item{} left for manual follow-up:",
            report.homework.len(),
            plural(report.homework.len())
        ));
        for line in report.homework.render().lines() {
            formatter.info(line);
        }
    }
}
