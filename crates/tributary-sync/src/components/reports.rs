//! Report reconciler
//!
//! Existing reports are left alone unless `update_reports` is set. Reports
//! named `Default` are generated by the platform per application and
//! additionally need `update_default_reports`.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tributary_core::domain::ComponentKind;

use super::applications::sync_application;
use super::{apply, source_ids, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Report;

/// Name of the platform-generated report
pub const DEFAULT_REPORT: &str = "Default";

pub struct ReportReconciler;

#[async_trait]
impl Reconciler for ReportReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, KIND).await? {
            sync_report(ctx, &id).await?;
        }
        Ok(())
    }
}

pub(crate) fn update_gate(ctx: &RunContext, name: &str) -> UpdateGate {
    let gate = UpdateGate::for_kind(ctx, KIND).and(ctx.settings.update_reports, "update_reports is off");
    if name == DEFAULT_REPORT {
        gate.and(
            ctx.settings.update_default_reports,
            "update_default_reports is off",
        )
    } else {
        gate
    }
}

/// Reconcile the source report `id` and its applications, once per run
pub fn sync_report<'a>(ctx: &'a RunContext, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(KIND, id).await? else {
            return Ok(());
        };
        let Some(mut report) = ctx.fetch_source(KIND, id, &name).await? else {
            return Ok(());
        };

        for application_id in report.id_list("applicationIds") {
            sync_application(ctx, &application_id).await?;
        }

        report.normalize();
        let existing = ctx.destination.locate(KIND, Some(id), &name).await?;
        apply(ctx, KIND, report, existing, update_gate(ctx, &name)).await?;
        Ok(())
    }
    .boxed()
}
