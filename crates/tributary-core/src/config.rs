//! Configuration module for Tributary.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::filter::parse_expressions;
use crate::domain::ComponentKind;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Tributary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: InstanceConfig,
    pub destination: InstanceConfig,
    pub sync: SyncConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Base URL, e.g. `https://soar.example.com`.
    pub host: String,
    /// Pre-issued access token. Prefer `access_token_env` outside of tests.
    pub access_token: Option<String>,
    /// Environment variable holding the access token.
    pub access_token_env: Option<String>,
    /// Whether TLS certificates are verified.
    pub verify_ssl: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Reconciliation switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Report what would change instead of changing it.
    pub dry_run: bool,
    /// Do not install packages; leave them as homework.
    pub offline: bool,
    /// Update reports that already exist on the destination.
    pub update_reports: bool,
    /// Update dashboards that already exist on the destination.
    pub update_dashboards: bool,
    /// Also update reports named `Default`.
    pub update_default_reports: bool,
    /// Log remote failures and carry on instead of aborting.
    pub continue_on_error: bool,
    /// Make destination application fields match the source exactly.
    pub mirror_app_fields: bool,
    /// Allow migrating between differing platform versions.
    pub use_unsupported_version: bool,
    /// Skip the confirmation prompt for unsupported migrations.
    pub force_unsupported_version: bool,
    /// Kinds to reconcile; empty means all.
    pub components: Vec<ComponentKind>,
    /// `kind=name` expressions to include.
    pub include: Vec<String>,
    /// `kind=name` expressions to exclude.
    pub exclude: Vec<String>,
}

/// Audit archive settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// When set, every payload read and written is archived under this directory.
    pub dump_content_path: Option<PathBuf>,
    /// Where the output log and homework are written when a run records errors
    /// without `dump_content_path`. Defaults to the working directory.
    pub error_dump_path: Option<PathBuf>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/tributary/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tributary")
            .join("config.yaml")
    }

    /// Kinds to reconcile, in sync order.
    pub fn components(&self) -> Vec<ComponentKind> {
        if self.sync.components.is_empty() {
            return ComponentKind::ALL.to_vec();
        }
        let mut kinds = self.sync.components.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

impl InstanceConfig {
    /// The access token, read from the configured environment variable when
    /// no literal token is set.
    pub fn resolve_token(&self) -> Option<String> {
        self.access_token.clone().or_else(|| {
            self.access_token_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            access_token: None,
            access_token_env: None,
            verify_ssl: true,
            timeout_secs: 120,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            offline: false,
            update_reports: false,
            update_dashboards: false,
            update_default_reports: false,
            continue_on_error: false,
            mirror_app_fields: false,
            use_unsupported_version: false,
            force_unsupported_version: false,
            components: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"source.host"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- instances ---
        validate_instance("source", &self.source, &mut errors);
        validate_instance("destination", &self.destination, &mut errors);
        if !self.source.host.is_empty()
            && self.source.host.trim_end_matches('/') == self.destination.host.trim_end_matches('/')
        {
            errors.push(ValidationError {
                field: "destination.host".into(),
                message: "must differ from source.host".into(),
            });
        }

        // --- sync ---
        if !self.sync.include.is_empty() && !self.sync.exclude.is_empty() {
            errors.push(ValidationError {
                field: "sync.include".into(),
                message: "cannot be combined with sync.exclude".into(),
            });
        }
        for (field, expressions) in [("sync.include", &self.sync.include), ("sync.exclude", &self.sync.exclude)] {
            if let Err(e) = parse_expressions(expressions) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: e.to_string(),
                });
            }
        }
        if self.sync.force_unsupported_version && !self.sync.use_unsupported_version {
            errors.push(ValidationError {
                field: "sync.force_unsupported_version".into(),
                message: "requires sync.use_unsupported_version".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

fn validate_instance(prefix: &str, instance: &InstanceConfig, errors: &mut Vec<ValidationError>) {
    if instance.host.trim().is_empty() {
        errors.push(ValidationError {
            field: format!("{prefix}.host"),
            message: "must be set".into(),
        });
    } else if !(instance.host.starts_with("http://") || instance.host.starts_with("https://")) {
        errors.push(ValidationError {
            field: format!("{prefix}.host"),
            message: format!("must start with http:// or https://, got '{}'", instance.host),
        });
    }
    if instance.access_token.is_none() && instance.access_token_env.is_none() {
        errors.push(ValidationError {
            field: format!("{prefix}.access_token"),
            message: "set access_token or access_token_env".into(),
        });
    }
    if instance.timeout_secs == 0 {
        errors.push(ValidationError {
            field: format!("{prefix}.timeout_secs"),
            message: "must be greater than 0".into(),
        });
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with [`Config::default()`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- instances ---

    pub fn source(mut self, host: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.source.host = host.into();
        self.config.source.access_token = Some(token.into());
        self
    }

    pub fn destination(mut self, host: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.destination.host = host.into();
        self.config.destination.access_token = Some(token.into());
        self
    }

    pub fn timeout_secs(mut self, seconds: u64) -> Self {
        self.config.source.timeout_secs = seconds;
        self.config.destination.timeout_secs = seconds;
        self
    }

    // --- sync ---

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.sync.dry_run = dry_run;
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.config.sync.offline = offline;
        self
    }

    pub fn update_reports(mut self, enabled: bool) -> Self {
        self.config.sync.update_reports = enabled;
        self
    }

    pub fn update_dashboards(mut self, enabled: bool) -> Self {
        self.config.sync.update_dashboards = enabled;
        self
    }

    pub fn update_default_reports(mut self, enabled: bool) -> Self {
        self.config.sync.update_default_reports = enabled;
        self
    }

    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.config.sync.continue_on_error = enabled;
        self
    }

    pub fn mirror_app_fields(mut self, enabled: bool) -> Self {
        self.config.sync.mirror_app_fields = enabled;
        self
    }

    pub fn use_unsupported_version(mut self, enabled: bool) -> Self {
        self.config.sync.use_unsupported_version = enabled;
        self
    }

    pub fn force_unsupported_version(mut self, enabled: bool) -> Self {
        self.config.sync.force_unsupported_version = enabled;
        self
    }

    pub fn components(mut self, kinds: Vec<ComponentKind>) -> Self {
        self.config.sync.components = kinds;
        self
    }

    pub fn include(mut self, expression: impl Into<String>) -> Self {
        self.config.sync.include.push(expression.into());
        self
    }

    pub fn exclude(mut self, expression: impl Into<String>) -> Self {
        self.config.sync.exclude.push(expression.into());
        self
    }

    // --- audit ---

    pub fn dump_content_path(mut self, path: PathBuf) -> Self {
        self.config.audit.dump_content_path = Some(path);
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
