//! Workspace reconciler
//!
//! A workspace lists the applications and dashboards it shows. Both are
//! reconciled first so the workspace never points at something missing on
//! the destination.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tributary_core::domain::ComponentKind;

use super::applications::sync_application;
use super::dashboards::sync_dashboard;
use super::{apply, source_ids, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Workspace;

pub struct WorkspaceReconciler;

#[async_trait]
impl Reconciler for WorkspaceReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, KIND).await? {
            sync_workspace(ctx, &id).await?;
        }
        Ok(())
    }
}

/// Reconcile the source workspace `id` and what it shows, once per run
pub fn sync_workspace<'a>(ctx: &'a RunContext, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(KIND, id).await? else {
            return Ok(());
        };
        let Some(mut workspace) = ctx.fetch_source(KIND, id, &name).await? else {
            return Ok(());
        };

        for application_id in workspace.id_list("applications") {
            sync_application(ctx, &application_id).await?;
        }
        for dashboard_id in workspace.id_list("dashboards") {
            sync_dashboard(ctx, &dashboard_id).await?;
        }

        workspace.normalize();
        let existing = ctx.destination.locate(KIND, Some(id), &name).await?;
        apply(ctx, KIND, workspace, existing, UpdateGate::for_kind(ctx, KIND)).await?;
        Ok(())
    }
    .boxed()
}
