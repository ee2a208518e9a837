//! Keystore reconciler
//!
//! Only key names travel. A key missing on the destination is created with
//! an empty value and its value is left as homework.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use tributary_core::domain::{ComponentKind, ConfigObject, DiffEntry, DiffType};

use super::Reconciler;
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Keystore;

pub struct KeystoreReconciler;

#[async_trait]
impl Reconciler for KeystoreReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        let source = ctx.source_index(KIND).await?;
        let Some(existing) = ctx.destination.list(KIND).await? else {
            return Ok(());
        };
        let existing: HashSet<&str> = existing.iter().filter_map(ConfigObject::name).collect();

        for key in source.iter().filter_map(ConfigObject::name) {
            if !ctx.allows(KIND, key) || !ctx.begin(KIND, key) {
                continue;
            }
            if existing.contains(key) {
                debug!(key, "Keystore key present");
                continue;
            }

            if ctx.dry_run() {
                ctx.record(DiffEntry::new(KIND, key, DiffType::Added));
            } else {
                let entry = ConfigObject::new(json!({ "name": key, "value": "" }));
                if ctx.destination.add(KIND, &entry).await?.is_none() {
                    continue;
                }
            }
            ctx.homework(
                KIND,
                format!("Set the value of keystore key '{key}' on the destination"),
            );
        }
        Ok(())
    }
}
