//! Call executor
//!
//! Every remote call made during a run goes through [`CallExecutor`] exactly
//! once. The executor:
//!
//! 1. Appends one line to the run's [`OutputLog`], success or failure
//! 2. Classifies failures into a [`ReasonCode`]
//! 3. Applies the continue-on-error policy: the failure is either returned as a
//!    fatal [`SyncError::Remote`] or swallowed into `None`
//! 4. Mirrors payloads into the audit archive when content dumping is enabled
//!
//! Reconcilers never see the raw accessor; they go through
//! [`Instance`](crate::instance::Instance), which builds a [`Call`] per method.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};
use tributary_audit::{sanitize_segment, OutputLog, ReasonCode};
use tributary_core::domain::{ConfigObject, InstanceRole};
use tributary_core::ports::{IAuditSink, InstanceError};

use crate::SyncError;

/// Description of one remote call, used for logging and error context
#[derive(Debug, Clone)]
pub struct Call<'a> {
    pub function: &'static str,
    pub role: InstanceRole,
    pub host: &'a str,
    /// What the call is about, e.g. `applications/Phishing Triage`
    pub target: String,
}

/// Outcome of a lookup that may legitimately find nothing
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ConfigObject),
    /// Clean "not found"
    Missing,
    /// The instance answered with a body that could not be decoded
    Undecodable,
    /// The call failed and the failure was swallowed
    Failed,
}

impl Lookup {
    /// The found object, if any
    pub fn found(self) -> Option<ConfigObject> {
        match self {
            Lookup::Found(object) => Some(object),
            _ => None,
        }
    }
}

impl From<Option<ConfigObject>> for Lookup {
    fn from(value: Option<ConfigObject>) -> Self {
        value.map_or(Lookup::Missing, Lookup::Found)
    }
}

// ============================================================================
// CallExecutor
// ============================================================================

/// Single policy point for remote calls
pub struct CallExecutor {
    log: Arc<OutputLog>,
    archive: Option<Arc<dyn IAuditSink>>,
    continue_on_error: bool,
}

impl CallExecutor {
    /// Creates an executor. Payloads are archived only when `archive` is set.
    pub fn new(
        log: Arc<OutputLog>,
        archive: Option<Arc<dyn IAuditSink>>,
        continue_on_error: bool,
    ) -> Self {
        Self {
            log,
            archive,
            continue_on_error,
        }
    }

    pub fn log(&self) -> &Arc<OutputLog> {
        &self.log
    }

    /// Run `operation`, logging the outcome and applying the error policy.
    ///
    /// Returns `Ok(None)` when the call failed and the failure was swallowed.
    pub async fn execute<T, F>(&self, call: &Call<'_>, operation: F) -> Result<Option<T>, SyncError>
    where
        F: Future<Output = Result<T, InstanceError>>,
    {
        match operation.await {
            Ok(value) => {
                self.succeeded(call);
                Ok(Some(value))
            }
            Err(err) => self.failed(call, err).map(|()| None),
        }
    }

    /// Run a lookup, keeping "not found" and "undecodable" apart from failures
    pub async fn lookup<F>(&self, call: &Call<'_>, operation: F) -> Result<Lookup, SyncError>
    where
        F: Future<Output = Result<Option<ConfigObject>, InstanceError>>,
    {
        match operation.await {
            Ok(found) => {
                self.succeeded(call);
                Ok(found.into())
            }
            Err(InstanceError::Decode(message)) => {
                debug!(
                    function = call.function,
                    role = %call.role,
                    target = %call.target,
                    %message,
                    "Lookup returned an undecodable body"
                );
                self.log.warning(format!(
                    "{} on {} ({}) returned an undecodable body for '{}': {message}",
                    call.function, call.role, call.host, call.target
                ));
                Ok(Lookup::Undecodable)
            }
            Err(err) => self.failed(call, err).map(|()| Lookup::Failed),
        }
    }

    fn succeeded(&self, call: &Call<'_>) {
        self.log
            .call_succeeded(call.function, call.role.as_str(), call.host, &call.target);
    }

    fn failed(&self, call: &Call<'_>, err: InstanceError) -> Result<(), SyncError> {
        let reason = ReasonCode::from(&err);
        let message = err.to_string();
        self.log.call_failed(
            call.function,
            call.role.as_str(),
            call.host,
            &call.target,
            reason,
            &message,
        );

        if self.continue_on_error {
            warn!(
                function = call.function,
                role = %call.role,
                target = %call.target,
                %reason,
                error = %message,
                "Remote call failed, continuing"
            );
            Ok(())
        } else {
            error!(
                function = call.function,
                role = %call.role,
                target = %call.target,
                %reason,
                error = %message,
                "Remote call failed"
            );
            Err(SyncError::Remote {
                function: call.function,
                role: call.role,
                target: call.target.clone(),
                reason,
                source: err,
            })
        }
    }

    // ========================================================================
    // Audit archive
    // ========================================================================

    /// Mirror `object` into `content/{section}/{resource}/{name-or-id}.json`.
    ///
    /// A path that is already taken gets the object's id appended.
    pub fn archive(&self, section: &str, resource: &str, object: &ConfigObject) {
        let Some(archive) = &self.archive else {
            return;
        };
        let data = match serde_json::to_vec_pretty(object) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, resource, "Failed to serialize payload for the archive");
                return;
            }
        };

        let stem = sanitize_segment(&object.label());
        let mut path = format!("content/{section}/{resource}/{stem}.json");
        if archive.contains(&path) {
            if let Some(id) = object.id() {
                path = format!("content/{section}/{resource}/{stem}_{}.json", sanitize_segment(id));
            }
        }
        archive.add_file(&path, data);
    }
}
