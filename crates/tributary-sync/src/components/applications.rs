//! Application and workflow reconciler
//!
//! Applications are the only kind that reference their own kind, so the full
//! pass walks them in [`reference_order`]. Each application is transformed
//! before apply:
//!
//! - the source tracking field is never sent; the destination owns its own
//! - fields are the union of destination and source fields by id, or the
//!   source fields plus the destination tracking field in mirror mode
//! - `columns` holding source tracking ids are rewritten to destination ids
//!
//! The application's workflow is reconciled right after the application.
//! Once the pass is over, applications whose columns still hold source
//! tracking ids are rewritten in place; by then every correlation is known.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::debug;
use tributary_core::domain::{ComponentKind, ConfigObject, DiffEntry, DiffType};

use super::workspaces::sync_workspace;
use super::{apply, Reconciler, UpdateGate};
use crate::context::{RunContext, TRACKING_FIELD_ID};
use crate::executor::Lookup;
use crate::ordering::reference_order;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Application;
const FIELDS: &str = "fields";
const FIELD: &str = "field";
const WORKFLOW: &str = "workflow";

pub struct ApplicationReconciler;

#[async_trait]
impl Reconciler for ApplicationReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        let applications = ctx.source_index(KIND).await?;
        for (id, targets) in reference_order(&applications) {
            debug!(application = %id, references = targets.len(), "Next application");
            sync_application(ctx, &id).await?;
        }
        rewrite_references(ctx).await
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn field_id(field: &Value) -> Option<&str> {
    field.get("id").and_then(Value::as_str)
}

fn field_label(field: &Value) -> String {
    field
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| field_id(field))
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Whether `field` is the application's tracking field
pub fn is_tracking_field(field: &Value, tracking_id: Option<&str>) -> bool {
    let by_id = tracking_id.is_some() && field_id(field) == tracking_id;
    let by_type = field
        .get("fieldType")
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("tracking"));
    by_id || by_type
}

/// `fields` without the tracking field
pub fn without_tracking(fields: &[Value], tracking_id: Option<&str>) -> Vec<Value> {
    fields
        .iter()
        .filter(|field| !is_tracking_field(field, tracking_id))
        .cloned()
        .collect()
}

fn contains_field(fields: &[Value], id: Option<&str>) -> bool {
    id.is_some() && fields.iter().any(|f| field_id(f) == id)
}

/// Union of destination and source fields by id.
///
/// Destination order is kept and shared fields take the source version;
/// source-only fields are appended. Destination-only fields survive.
pub fn merge_fields(destination: &[Value], source: &[Value]) -> Vec<Value> {
    let mut merged: Vec<Value> = destination
        .iter()
        .map(|current| {
            field_id(current)
                .and_then(|id| source.iter().find(|f| field_id(f) == Some(id)))
                .unwrap_or(current)
                .clone()
        })
        .collect();
    merged.extend(
        source
            .iter()
            .filter(|field| !contains_field(destination, field_id(field)))
            .cloned(),
    );
    merged
}

/// Source fields plus the destination tracking field
pub fn mirror_fields(destination: &[Value], source: &[Value], tracking_id: Option<&str>) -> Vec<Value> {
    let mut mirrored = source.to_vec();
    mirrored.extend(
        destination
            .iter()
            .filter(|field| is_tracking_field(field, tracking_id))
            .cloned(),
    );
    mirrored
}

/// Rewrite `columns` entries that are source tracking ids. Returns whether
/// anything changed.
async fn translate_columns(ctx: &RunContext, fields: &mut [Value]) -> Result<bool, SyncError> {
    let mut changed = false;
    for field in fields.iter_mut() {
        let Some(columns) = field.get_mut("columns").and_then(Value::as_array_mut) else {
            continue;
        };
        for column in columns.iter_mut() {
            let Some(id) = column.as_str().map(str::to_string) else {
                continue;
            };
            if let Some(translated) = ctx.resolve_tracking(&id).await? {
                if translated != id {
                    *column = Value::String(translated);
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

fn record_field_changes(
    ctx: &RunContext,
    name: &str,
    destination: &[Value],
    source: &[Value],
    tracking_id: Option<&str>,
) {
    for field in source {
        if !contains_field(destination, field_id(field)) {
            ctx.record(
                DiffEntry::new(KIND, name, DiffType::Added)
                    .with_subcomponent(FIELD, Some(field_label(field))),
            );
        }
    }
    if ctx.settings.mirror_app_fields {
        for field in destination {
            if !is_tracking_field(field, tracking_id) && !contains_field(source, field_id(field)) {
                ctx.record(
                    DiffEntry::new(KIND, name, DiffType::Removed)
                        .with_subcomponent(FIELD, Some(field_label(field))),
                );
            }
        }
    }
}

// ============================================================================
// Applications
// ============================================================================

/// Reconcile the source application `id`, its workspaces and its workflow,
/// once per run
pub fn sync_application<'a>(ctx: &'a RunContext, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(KIND, id).await? else {
            return Ok(());
        };
        let Some(source) = ctx.fetch_source(KIND, id, &name).await? else {
            return Ok(());
        };

        for workspace_id in source.id_list("workspaces") {
            sync_workspace(ctx, &workspace_id).await?;
        }

        let source_tracking = source.str_field(TRACKING_FIELD_ID).map(str::to_string);
        let mut desired = source;
        desired.normalize();
        let source_fields = without_tracking(desired.array(FIELDS), source_tracking.as_deref());

        let gate = UpdateGate::for_kind(ctx, KIND);
        let existing = ctx.destination.locate(KIND, Some(id), &name).await?;
        let mut fields = match &existing {
            Lookup::Found(counterpart) => {
                let mut current = counterpart.clone();
                current.normalize();
                let tracking = current.str_field(TRACKING_FIELD_ID).map(str::to_string);
                let current_fields = current.array(FIELDS);
                if ctx.dry_run() && gate == UpdateGate::Allowed {
                    record_field_changes(ctx, &name, current_fields, &source_fields, tracking.as_deref());
                }
                match &tracking {
                    Some(tracking) => desired.set(TRACKING_FIELD_ID, Value::String(tracking.clone())),
                    None => {
                        desired.remove(TRACKING_FIELD_ID);
                    }
                }
                if ctx.settings.mirror_app_fields {
                    mirror_fields(current_fields, &source_fields, tracking.as_deref())
                } else {
                    merge_fields(current_fields, &source_fields)
                }
            }
            _ => {
                desired.remove(TRACKING_FIELD_ID);
                source_fields
            }
        };
        translate_columns(ctx, &mut fields).await?;
        desired.set(FIELDS, Value::Array(fields));

        let applied = apply(ctx, KIND, desired, existing, gate).await?;
        let counterpart = applied.destination();
        let destination_id = counterpart.and_then(ConfigObject::id).map(str::to_string);
        let destination_tracking = counterpart
            .and_then(|app| app.str_field(TRACKING_FIELD_ID))
            .map(str::to_string);

        if let (Some(source_tracking), Some(destination_tracking)) = (&source_tracking, &destination_tracking) {
            ctx.track(source_tracking, destination_tracking);
        }
        if let Some(destination_id) = &destination_id {
            ctx.map_identity(KIND, id, destination_id);
            ctx.queue_rewrite(id);
        }

        sync_workflow(ctx, id, &name, destination_id.as_deref()).await
    }
    .boxed()
}

// ============================================================================
// Workflows
// ============================================================================

async fn sync_workflow(
    ctx: &RunContext,
    source_application_id: &str,
    name: &str,
    destination_application_id: Option<&str>,
) -> Result<(), SyncError> {
    let Some(mut workflow) = ctx.source.get_workflow(source_application_id).await?.found() else {
        return Ok(());
    };
    workflow.normalize();

    let Some(application_id) = destination_application_id else {
        // The application itself only exists in the dry-run report
        if ctx.dry_run() {
            ctx.record(DiffEntry::new(KIND, name, DiffType::Added).with_subcomponent(WORKFLOW, None));
        }
        return Ok(());
    };
    workflow.set("applicationId", Value::String(application_id.to_string()));

    match ctx.destination.get_workflow(application_id).await? {
        Lookup::Missing | Lookup::Undecodable => {
            workflow.remove("id");
            if ctx.dry_run() {
                ctx.record(DiffEntry::new(KIND, name, DiffType::Added).with_subcomponent(WORKFLOW, None));
            } else if ctx.destination.add_workflow(&workflow).await?.is_some() {
                ctx.log().info(format!("Added workflow of application '{name}'"));
            }
        }
        Lookup::Found(current) => {
            if let Some(workflow_id) = current.id() {
                workflow.set("id", Value::String(workflow_id.to_string()));
            }
            if !workflow.differs_from(&current) || UpdateGate::for_kind(ctx, KIND) != UpdateGate::Allowed {
                return Ok(());
            }
            if ctx.dry_run() {
                ctx.record(DiffEntry::new(KIND, name, DiffType::Updated).with_subcomponent(WORKFLOW, None));
            } else if ctx.destination.update_workflow(&workflow).await?.is_some() {
                ctx.log().info(format!("Updated workflow of application '{name}'"));
            }
        }
        Lookup::Failed => {}
    }
    Ok(())
}

// ============================================================================
// Reference rewrite
// ============================================================================

/// Rewrite source tracking ids left in destination `columns`.
///
/// Runs after the applications pass. Dry runs translate columns while
/// transforming and only drain the queue here.
pub async fn rewrite_references(ctx: &RunContext) -> Result<(), SyncError> {
    let pending = ctx.take_rewrites();
    if ctx.dry_run() {
        return Ok(());
    }

    for source_id in pending {
        let Some(destination_id) = ctx.identity(KIND, &source_id) else {
            continue;
        };
        let Some(mut current) = ctx.destination.get(KIND, &destination_id).await?.found() else {
            continue;
        };
        current.normalize();
        let mut fields = current.array(FIELDS).to_vec();
        if !translate_columns(ctx, &mut fields).await? {
            continue;
        }

        let name = current.label();
        debug!(application = %name, "Rewriting reference columns");
        current.set(FIELDS, Value::Array(fields));
        if ctx.destination.update(KIND, &current).await?.is_some() {
            ctx.log()
                .info(format!("Rewrote reference columns of application '{name}'"));
        }
    }
    Ok(())
}
