//! Package reconciler
//!
//! Packages are keyed by `(name, pythonVersion)`. A missing package is
//! installed; an installed one is upgraded only when the source version is
//! strictly newer. In offline mode nothing is installed and every needed
//! change becomes homework.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use tributary_core::domain::version::is_newer;
use tributary_core::domain::{ComponentKind, ConfigObject, DiffEntry, DiffType};

use super::Reconciler;
use crate::context::RunContext;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Package;
const PYTHON_VERSION: &str = "pythonVersion";

pub struct PackageReconciler;

fn python_of(package: &ConfigObject) -> &str {
    package.str_field(PYTHON_VERSION).unwrap_or("Python3")
}

#[async_trait]
impl Reconciler for PackageReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        let source = ctx.source_index(KIND).await?;
        let Some(installed) = ctx.destination.list(KIND).await? else {
            return Ok(());
        };
        let installed: HashMap<(&str, &str), &ConfigObject> = installed
            .iter()
            .filter_map(|p| Some(((p.name()?, python_of(p)), p)))
            .collect();

        for package in source.iter() {
            let Some(name) = package.name() else {
                continue;
            };
            let python = python_of(package);
            if !ctx.allows(KIND, name) || !ctx.begin(KIND, &format!("{name}@{python}")) {
                continue;
            }
            let version = package.version().unwrap_or_default();

            let change = match installed.get(&(name, python)) {
                None => DiffType::Added,
                Some(current) => {
                    let current_version = current.version().unwrap_or_default();
                    if !is_newer(&version, &current_version) {
                        debug!(name, python, %version, "Package up to date");
                        continue;
                    }
                    DiffType::Upgraded
                }
            };

            if ctx.settings.offline {
                ctx.homework(
                    KIND,
                    format!("Install {python} package {name}=={version} on the destination"),
                );
                continue;
            }
            if ctx.dry_run() {
                ctx.record(DiffEntry::new(KIND, name, change));
                continue;
            }
            let request = ConfigObject::new(json!({
                "name": name,
                "version": version,
                PYTHON_VERSION: python,
            }));
            if ctx.destination.install_package(&request).await?.is_some() {
                ctx.log()
                    .info(format!("Installed {python} package {name}=={version}"));
            }
        }
        Ok(())
    }
}
