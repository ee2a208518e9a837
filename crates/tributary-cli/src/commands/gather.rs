//! Gather command - List the source instance's applications

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tributary_sync::Collector;

use super::{connect, load_config};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct GatherCommand {}

impl GatherCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
        let formatter = get_formatter(format);
        let config = load_config(config_path)?;
        let mut collector = Collector::new(connect("source", &config.source)?);

        let names = collector.gather().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "host": config.source.host,
                "applications": names,
            }));
        } else {
            formatter.success(&format!(
                "{} application{} on {}",
                names.len(),
                plural(names.len()),
                config.source.host
            ));
            for name in &names {
                formatter.info(name);
            }
        }
        Ok(())
    }
}
