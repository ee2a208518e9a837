//! Task reconciler
//!
//! Tasks carry three kinds of destination-specific ids that are rewritten
//! before apply:
//!
//! - plugin ids: a task running a plugin action names the plugin in
//!   `action.descriptor.packageDescriptor` and points at the plugin's `fileId`
//!   there, at the action's image in `action.descriptor.imageId` and at the
//!   action itself in `action.packageDescriptorId`. All three change when a
//!   plugin is installed
//! - tracking ids in input mappings and output mappings
//! - the asset a task runs against, which is reconciled first
//!
//! A destination task with a different `uid` is someone else's task sharing
//! the id; it is left alone.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::debug;
use tributary_core::domain::{ComponentKind, ConfigObject};

use super::assets::sync_asset;
use super::{apply, source_ids, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::executor::Lookup;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Task;

/// Action types that run without a plugin
pub const BUILTIN_ACTION_TYPES: &[&str] = &[
    "python",
    "python3",
    "python36",
    "powershell",
    "api",
    "email",
    "networkFile",
];

pub struct TaskReconciler;

#[async_trait]
impl Reconciler for TaskReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, KIND).await? {
            sync_task(ctx, &id).await?;
        }
        Ok(())
    }
}

/// Action type of the task, e.g. `python3` or a plugin action name
pub fn action_type(task: &ConfigObject) -> Option<&str> {
    task.pointer("/action/descriptor/actionType")
        .and_then(Value::as_str)
}

/// Whether the task runs a plugin action
pub fn uses_plugin(task: &ConfigObject) -> bool {
    action_type(task).is_some_and(|t| !BUILTIN_ACTION_TYPES.iter().any(|b| b.eq_ignore_ascii_case(t)))
}

/// Name of the plugin a task runs, when it runs one
pub fn plugin_name(task: &ConfigObject) -> Option<&str> {
    if !uses_plugin(task) {
        return None;
    }
    task.pointer("/action/descriptor/packageDescriptor/name")
        .and_then(Value::as_str)
}

/// Asset the task runs against
pub fn asset_id(task: &ConfigObject) -> Option<&str> {
    task.pointer("/action/assetId").and_then(Value::as_str)
}

/// Reconcile the source task `id` and its asset, once per run
pub fn sync_task<'a>(ctx: &'a RunContext, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(KIND, id).await? else {
            return Ok(());
        };
        let Some(mut task) = ctx.fetch_source(KIND, id, &name).await? else {
            return Ok(());
        };

        if let Some(asset) = asset_id(&task).map(str::to_string) {
            sync_asset(ctx, &asset).await?;
        }

        task.normalize();
        rewire_plugin(ctx, &mut task, &name).await?;
        rewrite_mappings(ctx, &mut task).await?;

        let existing = ctx.destination.locate(KIND, Some(id), &name).await?;
        if let Lookup::Found(current) = &existing {
            if let (Some(ours), Some(theirs)) = (task.uid(), current.uid()) {
                if ours != theirs {
                    debug!(task = %name, ours, theirs, "Destination task has a different uid");
                    ctx.homework(
                        KIND,
                        format!(
                            "Task '{name}' exists on the destination with a different uid ({theirs}); reconcile it manually"
                        ),
                    );
                    return Ok(());
                }
            }
        }

        apply(ctx, KIND, task, existing, UpdateGate::for_kind(ctx, KIND)).await?;
        Ok(())
    }
    .boxed()
}

/// Point a plugin task at the destination plugin's ids
async fn rewire_plugin(ctx: &RunContext, task: &mut ConfigObject, name: &str) -> Result<(), SyncError> {
    let Some(plugin) = plugin_name(task).map(str::to_string) else {
        return Ok(());
    };
    let action_name = action_type(task).map(str::to_string);

    let index = ctx.plugin_index().await?;
    let installed = index.get(&plugin);
    let action = installed.zip(action_name.as_ref()).and_then(|(p, a)| p.actions.get(a));

    let (Some(installed), Some(action)) = (installed, action) else {
        // A dry run installs nothing, so a missing plugin is expected there
        if !ctx.dry_run() {
            ctx.homework(
                KIND,
                format!(
                    "Task '{name}' uses plugin '{plugin}' action '{}' which is not installed on the destination",
                    action_name.as_deref().unwrap_or("<unknown>")
                ),
            );
        }
        return Ok(());
    };

    if let Some(descriptor) = task
        .pointer_mut("/action/descriptor")
        .and_then(Value::as_object_mut)
    {
        if let Some(image_id) = &action.image_id {
            descriptor.insert("imageId".into(), Value::String(image_id.clone()));
        }
        if let (Some(file_id), Some(package)) = (
            &installed.file_id,
            descriptor
                .get_mut("packageDescriptor")
                .and_then(Value::as_object_mut),
        ) {
            package.insert("fileId".into(), Value::String(file_id.clone()));
        }
    }
    if let Some(map) = task.pointer_mut("/action").and_then(Value::as_object_mut) {
        map.insert("packageDescriptorId".into(), Value::String(action.id.clone()));
    }
    Ok(())
}

async fn translate_in_place(ctx: &RunContext, value: Option<&mut Value>) -> Result<(), SyncError> {
    let Some(value) = value else {
        return Ok(());
    };
    let Some(id) = value.as_str().map(str::to_string) else {
        return Ok(());
    };
    if let Some(translated) = ctx.resolve_tracking(&id).await? {
        *value = Value::String(translated);
    }
    Ok(())
}

/// Rewrite tracking ids in `inputMapping[].value`,
/// `outputs[].backReferenceFieldId` and `outputs[].mappings[].value`
async fn rewrite_mappings(ctx: &RunContext, task: &mut ConfigObject) -> Result<(), SyncError> {
    if let Some(inputs) = task.array_mut("inputMapping") {
        for input in inputs.iter_mut() {
            translate_in_place(ctx, input.get_mut("value")).await?;
        }
    }
    if let Some(outputs) = task.array_mut("outputs") {
        for output in outputs.iter_mut() {
            translate_in_place(ctx, output.get_mut("backReferenceFieldId")).await?;
            if let Some(mappings) = output.get_mut("mappings").and_then(Value::as_array_mut) {
                for mapping in mappings.iter_mut() {
                    translate_in_place(ctx, mapping.get_mut("value")).await?;
                }
            }
        }
    }
    Ok(())
}
