//! Tributary CLI - Command-line interface for Tributary
//!
//! Provides commands for:
//! - Reconciling a source instance into a destination instance
//! - Listing source applications
//! - Reporting what an application pulls in when migrated
//! - Viewing and validating configuration

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tributary_core::config::Config;

mod commands;
mod output;

use commands::{
    collect::CollectCommand, config::ConfigCommand, gather::GatherCommand, sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "tributary",
    version,
    about = "Reconcile configuration between SOAR instances"
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
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile the source instance into the destination instance
    Sync(SyncCommand),
    /// List the applications on the source instance
    Gather(GatherCommand),
    /// Show everything an application depends on
    Collect(CollectCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(verbose: u8, config: Option<&Path>) {
    let logging = Config::load_or_default(&commands::config_path(config)).logging;
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.config.as_deref());

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(format, config).await,
        Commands::Gather(cmd) => cmd.execute(format, config).await,
        Commands::Collect(cmd) => cmd.execute(format, config).await,
        Commands::Config(cmd) => cmd.execute(format, config).await,
    }
}
