//! Tributary Client - HTTP adapter for configuration instances
//!
//! Provides an async client for one instance's REST API and an
//! [`IInstanceAccessor`](tributary_core::ports::IInstanceAccessor)
//! implementation on top of it.
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client with JSON and multipart helpers
//! - [`endpoints`] - Endpoint table per component kind
//! - [`provider`] - `HttpInstance`, the port implementation

pub mod client;
pub mod endpoints;
pub mod provider;

pub use client::{ClientOptions, InstanceClient};
pub use provider::HttpInstance;

use thiserror::Error;
use tributary_core::ports::InstanceError;

/// Errors that can occur when communicating with an instance
#[derive(Debug, Error)]
pub enum ClientError {
    /// The instance answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        /// Instance-specific error code from the body, if any
        code: Option<i64>,
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be parsed
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The configured host is not a usable base URL
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl From<ClientError> for InstanceError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Status {
                status: 400,
                code,
                message,
            } => InstanceError::BadRequest { code, message },
            ClientError::Status {
                status, message, ..
            } => InstanceError::Http { status, message },
            ClientError::Network(e) if e.is_timeout() => InstanceError::Timeout(e.to_string()),
            ClientError::Network(e) if e.is_connect() => InstanceError::Connection(e.to_string()),
            ClientError::Network(e) if e.is_decode() => InstanceError::Decode(e.to_string()),
            ClientError::Network(e) => InstanceError::Other(e.to_string()),
            ClientError::Decode(message) => InstanceError::Decode(message),
            ClientError::InvalidUrl(message) | ClientError::Build(message) => {
                InstanceError::Other(message)
            }
        }
    }
}
