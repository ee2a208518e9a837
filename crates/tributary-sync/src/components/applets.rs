//! Applet reconciler

use async_trait::async_trait;
use tributary_core::domain::ComponentKind;

use super::{apply, source_ids, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Applet;

pub struct AppletReconciler;

#[async_trait]
impl Reconciler for AppletReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, KIND).await? {
            let Some(name) = ctx.admit(KIND, &id).await? else {
                continue;
            };
            let Some(mut applet) = ctx.fetch_source(KIND, &id, &name).await? else {
                continue;
            };
            applet.normalize();

            let existing = ctx.destination.locate(KIND, Some(&id), &name).await?;
            apply(ctx, KIND, applet, existing, UpdateGate::for_kind(ctx, KIND)).await?;
        }
        Ok(())
    }
}
