//! Reason codes for failed remote calls
//!
//! Provides structured codes for categorizing why a call against an instance
//! failed. Used by the output log and the sync engine's error reports.

use std::fmt;

use serde::{Deserialize, Serialize};
use tributary_core::ports::InstanceError;

/// Structured reason codes for remote failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The instance rejected the payload
    BadRequest,
    /// Non-success HTTP status other than 400
    HttpError,
    /// The instance could not be reached
    ConnectionError,
    /// The call timed out
    Timeout,
    /// Empty or malformed response body
    DecodeError,
    /// An object listed by the instance could not be fetched
    NotFound,
    /// Anything unclassified
    Unknown,
}

impl ReasonCode {
    /// Classify a port-level error
    #[must_use]
    pub fn from_instance_error(error: &InstanceError) -> Self {
        match error {
            InstanceError::BadRequest { .. } => Self::BadRequest,
            InstanceError::Http { .. } => Self::HttpError,
            InstanceError::Connection(_) => Self::ConnectionError,
            InstanceError::Timeout(_) => Self::Timeout,
            InstanceError::Decode(_) => Self::DecodeError,
            InstanceError::Unsupported(_) | InstanceError::Other(_) => Self::Unknown,
        }
    }
}

impl From<&InstanceError> for ReasonCode {
    fn from(error: &InstanceError) -> Self {
        Self::from_instance_error(error)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::BadRequest => "bad_request",
            ReasonCode::HttpError => "http_error",
            ReasonCode::ConnectionError => "connection_error",
            ReasonCode::Timeout => "timeout",
            ReasonCode::DecodeError => "decode_error",
            ReasonCode::NotFound => "not_found",
            ReasonCode::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}
