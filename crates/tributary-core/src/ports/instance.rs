//! Instance accessor port (driven/secondary port)
//!
//! This module defines the typed read/write interface the engine uses against
//! one configuration instance. The HTTP adapter in `tributary-client` is the
//! production implementation; tests use an in-memory fake.
//!
//! ## Design Notes
//!
//! - Unlike most ports, errors are typed ([`InstanceError`]) because the
//!   engine's continue-on-error policy classifies them.
//! - A clean "not found" is `Ok(None)`, never an error.
//! - Component payloads are opaque [`ConfigObject`]s; the adapter is
//!   responsible for unwrapping list envelopes.

use thiserror::Error;

use crate::domain::{ComponentKind, ConfigObject};

// ============================================================================
// InstanceError
// ============================================================================

/// Classified failure of a remote call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstanceError {
    /// The instance rejected the request payload (HTTP 400)
    #[error("Bad request{}: {}", code_suffix(.code), .message)]
    BadRequest {
        /// Instance-specific error code, when the body carried one
        code: Option<i64>,
        message: String,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The instance could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response body was empty or not valid JSON
    #[error("Undecodable response: {0}")]
    Decode(String),

    /// The operation is not available for this kind
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

// ============================================================================
// IInstanceAccessor trait
// ============================================================================

/// Typed access to one configuration instance
///
/// Implementations must be `Send + Sync`: the engine holds them behind `Arc`
/// and awaits them from a `Send` future.
#[async_trait::async_trait]
pub trait IInstanceAccessor: Send + Sync {
    /// Base URL or other human-readable location of the instance
    fn host(&self) -> &str;

    /// Platform version string as reported by the instance
    async fn product_version(&self) -> Result<String, InstanceError>;

    /// Every object of `kind`
    async fn list(&self, kind: ComponentKind) -> Result<Vec<ConfigObject>, InstanceError>;

    /// One object by id. Kinds keyed by name accept a name here.
    async fn get(&self, kind: ComponentKind, id: &str) -> Result<Option<ConfigObject>, InstanceError>;

    /// One object by display name
    async fn find_by_name(
        &self,
        kind: ComponentKind,
        name: &str,
    ) -> Result<Option<ConfigObject>, InstanceError>;

    /// Create an object, returning the instance's stored copy
    async fn add(&self, kind: ComponentKind, object: &ConfigObject) -> Result<ConfigObject, InstanceError>;

    /// Replace an existing object, returning the instance's stored copy
    async fn update(&self, kind: ComponentKind, object: &ConfigObject) -> Result<ConfigObject, InstanceError>;

    /// Every workflow graph
    async fn list_workflows(&self) -> Result<Vec<ConfigObject>, InstanceError>;

    /// Workflow owned by the application `application_id`
    async fn get_workflow(&self, application_id: &str) -> Result<Option<ConfigObject>, InstanceError>;

    async fn add_workflow(&self, workflow: &ConfigObject) -> Result<ConfigObject, InstanceError>;

    async fn update_workflow(&self, workflow: &ConfigObject) -> Result<ConfigObject, InstanceError>;

    /// Raw plugin bundle stored under `file_id`
    async fn download_bundle(&self, file_id: &str) -> Result<Vec<u8>, InstanceError>;

    /// Install a new plugin from a bundle
    async fn upload_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<ConfigObject, InstanceError>;

    /// Replace an installed plugin with a newer bundle
    async fn upgrade_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<ConfigObject, InstanceError>;

    /// Install a language package (`name`, `version`, `pythonVersion`)
    async fn install_package(&self, package: &ConfigObject) -> Result<ConfigObject, InstanceError>;
}
