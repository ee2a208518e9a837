//! Tributary Sync - Cross-instance reconciliation engine
//!
//! Provides:
//! - Dependency-ordered reconciliation of 13 component kinds
//! - Dry-run diffing that mirrors the real apply path
//! - A single policy point for every remote call (logging, audit, continue-on-error)
//! - Application footprint collection
//!
//! ## Modules
//!
//! - [`executor`] - Call executor: error classification, output log, audit archive
//! - [`instance`] - Executor-wrapped handle on one instance
//! - [`recorder`] - Dry-run diff recorder
//! - [`ordering`] - Reference order resolver for applications
//! - [`context`] - Per-run shared state
//! - [`components`] - One reconciler per component kind
//! - [`engine`] - Sync orchestrator and run guard
//! - [`collector`] - Gather/collect application footprints

pub mod collector;
pub mod components;
pub mod context;
pub mod engine;
pub mod executor;
pub mod instance;
pub mod ordering;
pub mod recorder;

pub use collector::{Collector, Footprint};
pub use context::{RunContext, RunSettings};
pub use engine::{Preflight, RunGuard, SyncEngine, SyncReport};
pub use executor::{Call, CallExecutor, Lookup};
pub use instance::Instance;
pub use recorder::DiffRecorder;

use thiserror::Error;
use tributary_audit::ReasonCode;
use tributary_core::domain::{ComponentKind, DomainError, InstanceRole};
use tributary_core::ports::InstanceError;

/// Errors that can occur during a reconciliation run
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid run configuration; never subject to continue-on-error
    #[error("Usage error: {0}")]
    Usage(#[from] DomainError),

    /// A remote call failed and continue-on-error is off
    #[error("{function} on {role} failed for '{target}' [{reason}]: {source}")]
    Remote {
        function: &'static str,
        role: InstanceRole,
        target: String,
        reason: ReasonCode,
        #[source]
        source: InstanceError,
    },

    /// An object listed by the source could not be fetched
    #[error("{kind} '{target}' was listed but could not be found on the source")]
    ComponentNotFound { kind: ComponentKind, target: String },

    /// Source and destination platform versions cannot be reconciled
    #[error("Unsupported migration from {source_version} to {destination_version}: {reason}")]
    UnsupportedVersion {
        source_version: String,
        destination_version: String,
        reason: String,
    },

    /// The run was stopped before any component was reconciled
    #[error("Run aborted: {0}")]
    Aborted(String),

    /// Writing the run archive failed
    #[error("Audit archive error: {0}")]
    Audit(String),
}

impl SyncError {
    /// Map a version refusal from the domain onto the engine error
    pub(crate) fn from_version(error: DomainError) -> Self {
        match error {
            DomainError::UnsupportedVersion {
                source_version,
                destination_version,
                reason,
            } => Self::UnsupportedVersion {
                source_version,
                destination_version,
                reason,
            },
            other => Self::Usage(other),
        }
    }
}
