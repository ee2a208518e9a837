//! Collect command - Show what migrating an application pulls in
//!
//! Walks the source instance for each named application and prints its
//! workspaces, dashboards, reports, tasks, plugins, assets and the directory
//! objects holding its roles.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;
use tributary_sync::Collector;

use super::{connect, load_config};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CollectCommand {
    /// Application names
    #[arg(required = true)]
    pub applications: Vec<String>,
}

impl CollectCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let mut collector = Collector::new(connect("source", &config.source)?);

        let mut footprints = Vec::with_capacity(self.applications.len());
        for name in &self.applications {
            info!(application = %name, "Collecting footprint");
            footprints.push(collector.collect(name).await?);
        }

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&footprints)?);
        } else {
            for footprint in &footprints {
                print!("{}", footprint.render_tree());
            }
        }
        Ok(())
    }
}
