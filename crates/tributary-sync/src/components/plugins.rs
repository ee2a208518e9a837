//! Plugin reconciler
//!
//! Plugins are installed from bundles downloaded off the source. A plugin
//! that needs installing or upgrading but whose `compatibility` requirement
//! excludes the destination platform is left alone and becomes homework. Installation failures that
//! were swallowed under continue-on-error also become homework.

use async_trait::async_trait;
use tracing::{debug, info};
use tributary_core::domain::version::{is_newer, plugin_supports};
use tributary_core::domain::{ComponentKind, ConfigObject, DiffEntry, DiffType};

use super::Reconciler;
use crate::context::RunContext;
use crate::executor::Lookup;
use crate::SyncError;

const KIND: ComponentKind = ComponentKind::Plugin;

/// Extension expected by the destination's upload endpoint
const BUNDLE_EXTENSION: &str = "swimbundle";

pub struct PluginReconciler;

#[async_trait]
impl Reconciler for PluginReconciler {
    fn kind(&self) -> ComponentKind {
        KIND
    }

    async fn sync(&self, ctx: &RunContext) -> Result<(), SyncError> {
        let listed = ctx.source_index(KIND).await?;
        let mut changed = false;

        for name in listed.iter().filter_map(ConfigObject::name) {
            if !ctx.allows(KIND, name) || !ctx.begin(KIND, name) {
                continue;
            }
            changed |= sync_plugin(ctx, name).await?;
        }

        if changed {
            ctx.invalidate_plugin_index();
        }
        Ok(())
    }
}

/// Reconcile one plugin. Returns whether the destination changed.
async fn sync_plugin(ctx: &RunContext, name: &str) -> Result<bool, SyncError> {
    let Some(plugin) = ctx.source.find_by_name(KIND, name).await?.found() else {
        return Ok(false);
    };
    let version = plugin.version().unwrap_or_default();

    let change = match ctx.destination.find_by_name(KIND, name).await? {
        Lookup::Missing | Lookup::Undecodable => DiffType::Added,
        Lookup::Found(installed) => {
            let installed_version = installed.version().unwrap_or_default();
            if !is_newer(&version, &installed_version) {
                debug!(plugin = name, %version, %installed_version, "Plugin up to date");
                return Ok(false);
            }
            DiffType::Upgraded
        }
        Lookup::Failed => return Ok(false),
    };

    let requirement = plugin.str_field("compatibility");
    if !plugin_supports(requirement, ctx.destination_version()) {
        info!(plugin = name, requirement, "Plugin incompatible with destination");
        ctx.homework(
            KIND,
            format!(
                "Plugin '{name}' {version} requires platform '{}' but the destination runs {}; install a compatible version manually",
                requirement.unwrap_or_default(),
                ctx.destination_version()
            ),
        );
        return Ok(false);
    }

    if ctx.dry_run() {
        ctx.record(DiffEntry::new(KIND, name, change));
        return Ok(false);
    }

    let installed = install(ctx, &plugin, name, change).await?;
    if !installed {
        ctx.homework(
            KIND,
            format!("Plugin '{name}' {version} could not be installed; install it manually"),
        );
    }
    Ok(installed)
}

async fn install(
    ctx: &RunContext,
    plugin: &ConfigObject,
    name: &str,
    change: DiffType,
) -> Result<bool, SyncError> {
    let Some(file_id) = plugin.str_field("fileId") else {
        ctx.log()
            .warning(format!("Plugin '{name}' has no bundle file id on the source"));
        return Ok(false);
    };
    let Some(bundle) = ctx.source.download_bundle(name, file_id).await? else {
        return Ok(false);
    };

    let file_name = format!("{name}.{BUNDLE_EXTENSION}");
    let stored = if change == DiffType::Upgraded {
        ctx.destination.upgrade_plugin(&file_name, bundle).await?
    } else {
        ctx.destination.upload_plugin(&file_name, bundle).await?
    };
    if stored.is_some() {
        ctx.log().info(format!("Plugin '{name}' {change}"));
    }
    Ok(stored.is_some())
}
