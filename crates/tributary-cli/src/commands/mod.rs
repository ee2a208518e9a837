//! Subcommands and the wiring they share

pub mod collect;
pub mod config;
pub mod gather;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tributary_client::{ClientOptions, HttpInstance, InstanceClient};
use tributary_core::config::{Config, InstanceConfig};
use tributary_core::ports::IInstanceAccessor;

/// The file `--config` points at, or the default location
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(Config::default_path, Path::to_path_buf)
}

/// Load configuration.
///
/// An explicit `--config` file must exist and parse; the default location
/// falls back to defaults when absent.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit);
    let config = match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(&path),
    };
    info!(config_path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// HTTP accessor for one configured instance
pub fn connect(role: &str, instance: &InstanceConfig) -> Result<Arc<dyn IInstanceAccessor>> {
    let token = instance
        .resolve_token()
        .with_context(|| format!("No access token configured for the {role} instance"))?;
    let options = ClientOptions {
        timeout: Duration::from_secs(instance.timeout_secs),
        verify_ssl: instance.verify_ssl,
    };
    let client = InstanceClient::with_options(&instance.host, token, options)
        .with_context(|| format!("Failed to create HTTP client for {}", instance.host))?;
    Ok(Arc::new(HttpInstance::new(client)))
}
