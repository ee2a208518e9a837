//! Asset reconciler

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tributary_core::domain::ComponentKind;

use super::{apply, source_ids, Reconciler, UpdateGate};
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Asset;

pub struct AssetReconciler;

#[async_trait]
impl Reconciler for AssetReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        for id in source_ids(ctx, KIND).await? {
            sync_asset(ctx, &id).await?;
        }
        Ok(())
    }
}

/// Reconcile the source asset `id`, once per run
pub fn sync_asset<'a>(ctx: &'a RunContext, id: &'a str) -> BoxFuture<'a, Result<(), SyncError>> {
    async move {
        let Some(name) = ctx.admit(KIND, id).await? else {
            return Ok(());
        };
        let Some(mut asset) = ctx.fetch_source(KIND, id, &name).await? else {
            return Ok(());
        };
        asset.normalize();

        let existing = ctx.destination.locate(KIND, Some(id), &name).await?;
        apply(ctx, KIND, asset, existing, UpdateGate::for_kind(ctx, KIND)).await?;
        Ok(())
    }
    .boxed()
}
