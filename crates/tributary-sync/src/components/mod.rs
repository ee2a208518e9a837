//! Component reconcilers
//!
//! One reconciler per [`ComponentKind`]. Each implements the same loop:
//! fetch-or-skip, dependency pre-pass, destination lookup, transform, apply.
//!
//! Kinds that other kinds depend on expose a single-object entry point
//! (`sync_workspace`, `sync_application`, ...). Pre-passes call those entry
//! points directly; the per-run memo in [`RunContext`] turns repeated visits
//! into no-ops, which is what breaks workspace ↔ application and
//! user ↔ group ↔ role cycles.
//!
//! The single-object entry points are mutually recursive and therefore return
//! boxed futures.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use tributary_core::domain::{ComponentKind, ConfigObject, DiffEntry, DiffType};

use crate::context::RunContext;
use crate::executor::Lookup;
use crate::SyncError;

pub mod applets;
pub mod applications;
pub mod assets;
pub mod dashboards;
pub mod keystore;
pub mod packages;
pub mod plugins;
pub mod reports;
pub mod tasks;
pub mod users;
pub mod workspaces;

// ============================================================================
// Reconciler trait
// ============================================================================

/// Full pass over one component kind
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> ComponentKind;

    /// Reconcile every source object of this kind
    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError>;
}

/// The reconciler responsible for `kind`
pub fn reconciler_for(kind: ComponentKind) -> Box<dyn Reconciler> {
    match kind {
        ComponentKind::Keystore => Box::new(keystore::KeystoreReconciler),
        ComponentKind::Package => Box::new(packages::PackageReconciler),
        ComponentKind::Plugin => Box::new(plugins::PluginReconciler),
        ComponentKind::Asset => Box::new(assets::AssetReconciler),
        ComponentKind::Workspace => Box::new(workspaces::WorkspaceReconciler),
        ComponentKind::Applet => Box::new(applets::AppletReconciler),
        ComponentKind::Application => Box::new(applications::ApplicationReconciler),
        ComponentKind::Task => Box::new(tasks::TaskReconciler),
        ComponentKind::Report => Box::new(reports::ReportReconciler),
        ComponentKind::Dashboard => Box::new(dashboards::DashboardReconciler),
        ComponentKind::User | ComponentKind::Group | ComponentKind::Role => {
            Box::new(users::DirectoryReconciler::new(kind))
        }
    }
}

/// Ids of every listed source object of `kind`, in listing order
pub(crate) async fn source_ids(ctx: &RunContext, kind: ComponentKind) -> Result<Vec<String>, SyncError> {
    let index = ctx.source_index(kind).await?;
    Ok(index
        .iter()
        .filter_map(ConfigObject::id)
        .map(str::to_string)
        .collect())
}

// ============================================================================
// Apply
// ============================================================================

/// Whether an existing destination object may be overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateGate {
    Allowed,
    Blocked(&'static str),
}

impl UpdateGate {
    /// Gate for a kind that is only being reconciled as a dependency
    pub(crate) fn for_kind(ctx: &RunContext, kind: ComponentKind) -> Self {
        if ctx.requested(kind) {
            Self::Allowed
        } else {
            Self::Blocked("reached only as a dependency")
        }
    }

    /// Combine with a per-kind switch
    pub(crate) fn and(self, enabled: bool, reason: &'static str) -> Self {
        match self {
            Self::Allowed if !enabled => Self::Blocked(reason),
            other => other,
        }
    }
}

/// Result of applying one desired object
#[derive(Debug)]
pub(crate) enum Applied {
    /// Absent on the destination. Carries the stored copy in a real run.
    Added(Option<ConfigObject>),
    /// A counterpart existed. `stored` is set when an update went through.
    Existing {
        counterpart: ConfigObject,
        stored: Option<ConfigObject>,
    },
    /// The destination lookup failed and the failure was swallowed
    Skipped,
}

impl Applied {
    /// The destination copy after apply, when there is one
    pub(crate) fn destination(&self) -> Option<&ConfigObject> {
        match self {
            Applied::Added(stored) => stored.as_ref(),
            Applied::Existing { counterpart, stored } => stored.as_ref().or(Some(counterpart)),
            Applied::Skipped => None,
        }
    }
}

/// Add `desired` when `existing` is absent, update it when present and
/// materially different. Under dry-run only the recorder is called.
pub(crate) async fn apply(
    ctx: &RunContext,
    kind: ComponentKind,
    mut desired: ConfigObject,
    existing: Lookup,
    gate: UpdateGate,
) -> Result<Applied, SyncError> {
    let name = desired.label();
    match existing {
        Lookup::Missing | Lookup::Undecodable => {
            if kind.keyed_by_name() {
                desired.remove("id");
            }
            if ctx.dry_run() {
                ctx.record(DiffEntry::new(kind, name, DiffType::Added));
                return Ok(Applied::Added(None));
            }
            let stored = ctx.destination.add(kind, &desired).await?;
            if stored.is_some() {
                ctx.log().info(format!("Added {} '{name}'", kind.title()));
            }
            Ok(Applied::Added(stored))
        }
        Lookup::Found(counterpart) => {
            if let Some(id) = counterpart.id() {
                desired.set("id", Value::String(id.to_string()));
            }
            if !desired.differs_from(&counterpart) {
                debug!(%kind, %name, "Unchanged");
                return Ok(Applied::Existing {
                    counterpart,
                    stored: None,
                });
            }
            if let UpdateGate::Blocked(reason) = gate {
                debug!(%kind, %name, reason, "Update skipped");
                ctx.log()
                    .info(format!("Not updating {} '{name}': {reason}", kind.title()));
                return Ok(Applied::Existing {
                    counterpart,
                    stored: None,
                });
            }
            if ctx.dry_run() {
                ctx.record(DiffEntry::new(kind, name, DiffType::Updated));
                return Ok(Applied::Existing {
                    counterpart,
                    stored: None,
                });
            }
            let stored = ctx.destination.update(kind, &desired).await?;
            if stored.is_some() {
                ctx.log().info(format!("Updated {} '{name}'", kind.title()));
            }
            Ok(Applied::Existing { counterpart, stored })
        }
        Lookup::Failed => Ok(Applied::Skipped),
    }
}

// ============================================================================
// Reference helpers
// ============================================================================

/// Id carried by a reference list element: a bare id or an object with `id`
pub(crate) fn element_id(item: &Value) -> Option<&str> {
    match item {
        Value::String(id) => Some(id),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        _ => None,
    }
}

/// Replace the id of a reference list element, keeping its shape
pub(crate) fn with_element_id(item: &Value, id: &str) -> Value {
    match item {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert("id".into(), Value::String(id.to_string()));
            Value::Object(map)
        }
        _ => Value::String(id.to_string()),
    }
}
