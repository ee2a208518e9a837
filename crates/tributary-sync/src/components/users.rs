//! Users, groups and roles
//!
//! The three directory kinds reference each other: users list their roles and
//! groups, groups list users, nested groups and roles, roles list users and
//! groups. They are keyed by name, so the destination assigns its own ids and
//! every reference list is remapped through the run's identity map before
//! apply. References that cannot be resolved on the destination are dropped.
//!
//! Referenced objects are reconciled first through [`sync_directory`]. A cycle
//! ends at the memo: the object that started it is applied last, so objects
//! reached inside the cycle are applied without their back-reference. Those
//! objects are applied once more at the end of the pass, when the reference
//! resolves. Under dry-run the retry is skipped and the first pass reports
//! what it would send.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::debug;
use tributary_core::domain::{ComponentKind, ConfigObject};

use super::{apply, element_id, source_ids, with_element_id, Applied, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::SyncError;

/// User keys that never leave the source
pub const SECRET_KEYS: &[&str] = &["password", "passwordHash", "passwordSalt"];

/// Reference lists per kind and the kind they point at
pub fn references(kind: ComponentKind) -> &'static [(&'static str, ComponentKind)] {
    match kind {
        ComponentKind::User => &[("roles", ComponentKind::Role), ("groups", ComponentKind::Group)],
        ComponentKind::Group => &[
            ("users", ComponentKind::User),
            ("groups", ComponentKind::Group),
            ("roles", ComponentKind::Role),
        ],
        ComponentKind::Role => &[("users", ComponentKind::User), ("groups", ComponentKind::Group)],
        _ => &[],
    }
}

/// Full pass over one of users, groups or roles
pub struct DirectoryReconciler {
    kind: ComponentKind,
}

impl DirectoryReconciler {
    pub fn new(kind: ComponentKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Reconciler for DirectoryReconciler {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, self.kind).await? {
            sync_directory(ctx, self.kind, &id).await?;
        }
        retry_deferred(ctx).await
    }
}

/// Reconcile the source user, group or role `id`, once per run
pub fn sync_directory<'a>(
    ctx: &'a RunContext,
    kind: ComponentKind,
    id: &'a str,
) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(kind, id).await? else {
            return Ok(());
        };
        let Some(object) = ctx.fetch_source(kind, id, &name).await? else {
            return Ok(());
        };

        for (key, target) in references(kind) {
            for reference in object.id_list(key) {
                sync_directory(ctx, *target, &reference).await?;
            }
        }

        reconcile(ctx, kind, id, &name, object).await
    }
    .boxed()
}

/// Apply again the objects that had to drop a reference to something still
/// being reconciled. By now those references exist on the destination.
pub async fn retry_deferred(ctx: &RunContext) -> Result<(), SyncError> {
    for (kind, id) in ctx.take_deferred() {
        let Some(name) = ctx.source_name(kind, &id).await? else {
            continue;
        };
        let Some(object) = ctx.fetch_source(kind, &id, &name).await? else {
            continue;
        };
        debug!(%kind, %name, "Retrying with resolved references");
        reconcile(ctx, kind, &id, &name, object).await?;
    }
    Ok(())
}

async fn reconcile(
    ctx: &RunContext,
    kind: ComponentKind,
    id: &str,
    name: &str,
    mut object: ConfigObject,
) -> Result<(), SyncError> {
    object.normalize();
    if kind == ComponentKind::User {
        for key in SECRET_KEYS {
            object.remove(key);
        }
    }
    let mut unresolved_in_progress = false;
    for (key, target) in references(kind) {
        unresolved_in_progress |= remap_references(ctx, &mut object, key, *target).await?;
    }

    let existing = ctx.destination.locate(kind, Some(id), name).await?;
    let applied = apply(ctx, kind, object, existing, UpdateGate::for_kind(ctx, kind)).await?;

    if let Some(destination_id) = applied.destination().and_then(ConfigObject::id) {
        ctx.map_identity(kind, id, destination_id);
        if unresolved_in_progress && !ctx.dry_run() {
            ctx.defer(kind, id);
        }
    }
    let created = match &applied {
        Applied::Added(stored) => ctx.dry_run() || stored.is_some(),
        _ => false,
    };
    if created && kind == ComponentKind::User {
        ctx.homework(
            kind,
            format!("User '{name}' was created without a password; set one on the destination"),
        );
    }
    Ok(())
}

/// Replace source ids under `key` with destination ids, dropping the ones
/// with no destination counterpart.
///
/// Returns whether a dropped reference points at an object this run is
/// still reconciling.
async fn remap_references(
    ctx: &RunContext,
    object: &mut ConfigObject,
    key: &str,
    target: ComponentKind,
) -> Result<bool, SyncError> {
    let Some(items) = object.get(key).and_then(Value::as_array).cloned() else {
        return Ok(false);
    };

    let mut in_progress = false;
    let mut remapped = Vec::with_capacity(items.len());
    for item in &items {
        let Some(source_id) = element_id(item) else {
            continue;
        };
        match ctx.resolve_identity(target, source_id).await? {
            Some(destination_id) => remapped.push(with_element_id(item, &destination_id)),
            None => {
                debug!(%target, source_id, "Dropping unresolved reference");
                in_progress |= ctx.is_begun(target, source_id);
            }
        }
    }
    object.set(key, Value::Array(remapped));
    Ok(in_progress)
}
