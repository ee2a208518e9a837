//! Application footprint collection
//!
//! Read-only walk over the source instance. [`Collector::gather`] lists the
//! application names; [`Collector::collect`] reports everything one
//! application pulls in when it is migrated:
//!
//! - workspaces showing it, their dashboards, and those dashboards' reports
//! - tasks bound to it, with the plugins and assets they use
//! - roles granted on it, with the groups and users holding those roles

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use tributary_audit::OutputLog;
use tributary_core::domain::{ComponentKind, ConfigObject, InstanceRole};
use tributary_core::ports::IInstanceAccessor;

use crate::components::dashboards::report_ids;
use crate::components::tasks::{asset_id, plugin_name};
use crate::executor::{CallExecutor, Lookup};
use crate::instance::Instance;
use crate::SyncError;

/// A dashboard and the reports it shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardFootprint {
    pub name: String,
    pub reports: Vec<String>,
}

/// A workspace and its dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceFootprint {
    pub name: String,
    pub dashboards: Vec<DashboardFootprint>,
}

/// Everything an application depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Footprint {
    pub application: String,
    pub workspaces: Vec<WorkspaceFootprint>,
    pub tasks: Vec<String>,
    pub plugins: Vec<String>,
    pub assets: Vec<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub users: Vec<String>,
}

impl Footprint {
    /// Indented tree, one object per line
    pub fn render_tree(&self) -> String {
        let mut out = format!("Application: {}\n", self.application);
        for workspace in &self.workspaces {
            let _ = writeln!(out, "  Workspace: {}", workspace.name);
            for dashboard in &workspace.dashboards {
                let _ = writeln!(out, "    Dashboard: {}", dashboard.name);
                for report in &dashboard.reports {
                    let _ = writeln!(out, "      Report: {report}");
                }
            }
        }
        for (heading, names) in [
            ("Task", &self.tasks),
            ("Plugin", &self.plugins),
            ("Asset", &self.assets),
            ("Role", &self.roles),
            ("Group", &self.groups),
            ("User", &self.users),
        ] {
            for name in names {
                let _ = writeln!(out, "  {heading}: {name}");
            }
        }
        out
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Read-only footprint walker over the source instance
pub struct Collector {
    source: Instance,
    listings: HashMap<ComponentKind, Vec<ConfigObject>>,
}

impl Collector {
    pub fn new(source: Arc<dyn IInstanceAccessor>) -> Self {
        let executor = Arc::new(CallExecutor::new(Arc::new(OutputLog::new()), None, false));
        Self {
            source: Instance::new(InstanceRole::Source, source, executor),
            listings: HashMap::new(),
        }
    }

    /// Output log of every call made so far
    pub fn log(&self) -> &Arc<OutputLog> {
        self.source.executor().log()
    }

    async fn listing(&mut self, kind: ComponentKind) -> Result<&[ConfigObject], SyncError> {
        if !self.listings.contains_key(&kind) {
            let listed = self.source.list(kind).await?.unwrap_or_default();
            debug!(%kind, count = listed.len(), "Listed");
            self.listings.insert(kind, listed);
        }
        Ok(self.listings.get(&kind).map(Vec::as_slice).unwrap_or_default())
    }

    async fn name_of(&mut self, kind: ComponentKind, id: &str) -> Result<String, SyncError> {
        let listed = self.listing(kind).await?;
        Ok(listed
            .iter()
            .find(|o| o.id() == Some(id))
            .map_or_else(|| id.to_string(), ConfigObject::label))
    }

    /// Names of every source application, sorted
    pub async fn gather(&mut self) -> Result<Vec<String>, SyncError> {
        let mut names: Vec<String> = self
            .listing(ComponentKind::Application)
            .await?
            .iter()
            .filter_map(ConfigObject::name)
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        info!(applications = names.len(), "Gathered applications");
        Ok(names)
    }

    /// Footprint of the source application `name`
    pub async fn collect(&mut self, name: &str) -> Result<Footprint, SyncError> {
        let application = match self
            .source
            .find_by_name(ComponentKind::Application, name)
            .await?
        {
            Lookup::Found(application) => application,
            _ => {
                return Err(SyncError::ComponentNotFound {
                    kind: ComponentKind::Application,
                    target: name.to_string(),
                })
            }
        };
        let application_id = application.id().unwrap_or_default().to_string();

        let mut footprint = Footprint {
            application: application.label(),
            ..Default::default()
        };
        self.collect_workspaces(&application_id, &mut footprint).await?;
        self.collect_tasks(&application_id, &mut footprint).await?;
        self.collect_permissions(&application, &mut footprint).await?;
        Ok(footprint)
    }

    async fn collect_workspaces(&mut self, application_id: &str, footprint: &mut Footprint) -> Result<(), SyncError> {
        let workspaces: Vec<ConfigObject> = self
            .listing(ComponentKind::Workspace)
            .await?
            .iter()
            .filter(|ws| ws.id_list("applications").iter().any(|id| id == application_id))
            .cloned()
            .collect();

        for workspace in workspaces {
            let mut entry = WorkspaceFootprint {
                name: workspace.label(),
                dashboards: Vec::new(),
            };
            for dashboard_id in workspace.id_list("dashboards") {
                let Some(dashboard) = self
                    .source
                    .get(ComponentKind::Dashboard, &dashboard_id)
                    .await?
                    .found()
                else {
                    continue;
                };
                let mut reports = Vec::new();
                for report_id in report_ids(&dashboard) {
                    let report = self.name_of(ComponentKind::Report, &report_id).await?;
                    push_unique(&mut reports, &report);
                }
                entry.dashboards.push(DashboardFootprint {
                    name: dashboard.label(),
                    reports,
                });
            }
            footprint.workspaces.push(entry);
        }
        Ok(())
    }

    async fn collect_tasks(&mut self, application_id: &str, footprint: &mut Footprint) -> Result<(), SyncError> {
        let tasks: Vec<ConfigObject> = self
            .listing(ComponentKind::Task)
            .await?
            .iter()
            .filter(|task| task.str_field("applicationId") == Some(application_id))
            .cloned()
            .collect();

        for task in &tasks {
            push_unique(&mut footprint.tasks, &task.label());
            if let Some(plugin) = plugin_name(task) {
                push_unique(&mut footprint.plugins, plugin);
            }
            if let Some(asset) = asset_id(task) {
                let asset = self.name_of(ComponentKind::Asset, asset).await?;
                push_unique(&mut footprint.assets, &asset);
            }
        }
        Ok(())
    }

    async fn collect_permissions(&mut self, application: &ConfigObject, footprint: &mut Footprint) -> Result<(), SyncError> {
        let role_ids: Vec<String> = application
            .array("permissions")
            .iter()
            .filter(|p| {
                p.get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.eq_ignore_ascii_case("role"))
            })
            .filter_map(|p| p.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        for role_id in role_ids {
            let role = self
                .listing(ComponentKind::Role)
                .await?
                .iter()
                .find(|r| r.id() == Some(role_id.as_str()))
                .cloned();
            let Some(role) = role else {
                continue;
            };
            push_unique(&mut footprint.roles, &role.label());
            for group_id in role.id_list("groups") {
                let group = self.name_of(ComponentKind::Group, &group_id).await?;
                push_unique(&mut footprint.groups, &group);
            }
            for user_id in role.id_list("users") {
                let user = self.name_of(ComponentKind::User, &user_id).await?;
                push_unique(&mut footprint.users, &user);
            }
        }
        Ok(())
    }
}
