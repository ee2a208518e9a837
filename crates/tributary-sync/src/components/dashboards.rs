//! Dashboard reconciler

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tributary_core::domain::{ComponentKind, ConfigObject};

use super::reports::sync_report;
use super::{apply, source_ids, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Dashboard;

pub struct DashboardReconciler;

#[async_trait]
impl Reconciler for DashboardReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, KIND).await? {
            sync_dashboard(ctx, &id).await?;
        }
        Ok(())
    }
}

/// Report ids of the dashboard's widgets, in widget order
pub fn report_ids(dashboard: &ConfigObject) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for item in dashboard.array("items") {
        if let Some(id) = item.get("reportId").and_then(Value::as_str) {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

/// Reconcile the source dashboard `id` and its reports, once per run
pub fn sync_dashboard<'a>(ctx: &'a RunContext, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(KIND, id).await? else {
            return Ok(());
        };
        let Some(mut dashboard) = ctx.fetch_source(KIND, id, &name).await? else {
            return Ok(());
        };

        for report_id in report_ids(&dashboard) {
            sync_report(ctx, &report_id).await?;
        }

        dashboard.normalize();
        let existing = ctx.destination.locate(KIND, Some(id), &name).await?;
        let gate = UpdateGate::for_kind(ctx, KIND).and(
            ctx.settings.update_dashboards,
            "update_dashboards is off",
        );
        apply(ctx, KIND, dashboard, existing, gate).await?;
        Ok(())
    }
    .boxed()
}
