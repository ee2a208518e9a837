//! Domain error types
//!
//! Usage and validation failures raised by the domain types. These are always
//! fatal: the continue-on-error policy only applies to remote failures.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Both an include and an exclude filter were supplied
    #[error("Only one of include or exclude filters may be given, not both")]
    ConflictingFilters,

    /// A diff type outside the fixed set
    #[error("Invalid diff type '{0}': expected one of added, updated, upgraded, removed, moved")]
    InvalidDiffType(String),

    /// Unknown component kind name
    #[error("Unknown component kind: {0}")]
    UnknownComponent(String),

    /// Malformed `kind=name` filter expression
    #[error("Invalid filter expression '{0}': expected kind=name")]
    InvalidFilter(String),

    /// Version string that cannot be interpreted
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Source and destination platforms cannot be reconciled
    #[error("Unsupported version migration from {source_version} to {destination_version}: {reason}")]
    UnsupportedVersion {
        /// Source platform version
        source_version: String,
        /// Destination platform version
        destination_version: String,
        /// Why the migration is refused
        reason: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
