//! Shared helpers for engine integration tests
//!
//! [`MemoryInstance`] is an in-memory `IInstanceAccessor` that behaves like a
//! small instance: it assigns ids and tracking fields on add, installs plugins
//! from JSON bundles, and records every read and write so tests can assert on
//! what the engine touched.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tributary_core::config::{Config, ConfigBuilder};
use tributary_core::domain::{ComponentKind, ConfigObject};
use tributary_core::ports::{IInstanceAccessor, InstanceError};
use tributary_sync::SyncEngine;

/// One call the fake received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub op: &'static str,
    pub kind: ComponentKind,
    pub target: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ComponentKind, Vec<ConfigObject>>,
    workflows: Vec<ConfigObject>,
    bundles: HashMap<String, Vec<u8>>,
    failures: Vec<(&'static str, String)>,
    undecodable: Vec<(&'static str, String)>,
    reads: Vec<Recorded>,
    writes: Vec<Recorded>,
    next_id: u64,
}

pub struct MemoryInstance {
    host: String,
    version: String,
    state: Mutex<State>,
}

impl MemoryInstance {
    pub fn new(host: &str, version: &str) -> Self {
        Self {
            host: host.to_string(),
            version: version.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn on_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Seed an object
    pub fn with(self, kind: ComponentKind, object: Value) -> Self {
        self.lock()
            .objects
            .entry(kind)
            .or_default()
            .push(ConfigObject::new(object));
        self
    }

    pub fn with_workflow(self, workflow: Value) -> Self {
        self.lock().workflows.push(ConfigObject::new(workflow));
        self
    }

    /// Seed a downloadable plugin bundle; the bundle is the plugin's JSON
    pub fn with_bundle(self, file_id: &str, plugin: &Value) -> Self {
        self.lock()
            .bundles
            .insert(file_id.to_string(), serde_json::to_vec(plugin).unwrap());
        self
    }

    /// Make `op` fail with a connection error for `target` (a name or id)
    pub fn failing(self, op: &'static str, target: &str) -> Self {
        self.lock().failures.push((op, target.to_string()));
        self
    }

    /// Answer `op` on `target` with a body that cannot be decoded
    pub fn undecodable(self, op: &'static str, target: &str) -> Self {
        self.lock().undecodable.push((op, target.to_string()));
        self
    }

    pub fn writes(&self) -> Vec<Recorded> {
        self.lock().writes.clone()
    }

    pub fn reads(&self) -> Vec<Recorded> {
        self.lock().reads.clone()
    }

    pub fn objects(&self, kind: ComponentKind) -> Vec<ConfigObject> {
        self.lock().objects.get(&kind).cloned().unwrap_or_default()
    }

    pub fn named(&self, kind: ComponentKind, name: &str) -> Option<ConfigObject> {
        self.objects(kind).into_iter().find(|o| o.name() == Some(name))
    }

    pub fn workflows(&self) -> Vec<ConfigObject> {
        self.lock().workflows.clone()
    }

    fn read(&self, op: &'static str, kind: ComponentKind, target: &str) -> Result<(), InstanceError> {
        let mut state = self.lock();
        state.reads.push(Recorded {
            op,
            kind,
            target: target.to_string(),
        });
        check_failure(&state, op, target)
    }

    fn write(&self, op: &'static str, kind: ComponentKind, target: &str) -> Result<(), InstanceError> {
        let state = self.lock();
        check_failure(&state, op, target)?;
        drop(state);
        self.lock().writes.push(Recorded {
            op,
            kind,
            target: target.to_string(),
        });
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

fn check_failure(state: &State, op: &str, target: &str) -> Result<(), InstanceError> {
    if state.failures.iter().any(|(o, t)| *o == op && t == target) {
        return Err(InstanceError::Connection(format!("{op} {target}: connection refused")));
    }
    if state.undecodable.iter().any(|(o, t)| *o == op && t == target) {
        return Err(InstanceError::Decode(format!("{op} {target}: expected value at line 1 column 1")));
    }
    Ok(())
}

fn key_of(kind: ComponentKind, object: &ConfigObject) -> Option<String> {
    if matches!(kind, ComponentKind::Keystore | ComponentKind::Package) {
        object.name().map(str::to_string)
    } else {
        object.id().map(str::to_string)
    }
}

#[async_trait]
impl IInstanceAccessor for MemoryInstance {
    fn host(&self) -> &str {
        &self.host
    }

    async fn product_version(&self) -> Result<String, InstanceError> {
        Ok(self.version.clone())
    }

    async fn list(&self, kind: ComponentKind) -> Result<Vec<ConfigObject>, InstanceError> {
        self.read("list", kind, kind.as_str())?;
        Ok(self.objects(kind))
    }

    async fn get(&self, kind: ComponentKind, id: &str) -> Result<Option<ConfigObject>, InstanceError> {
        self.read("get", kind, id)?;
        Ok(self
            .objects(kind)
            .into_iter()
            .find(|o| key_of(kind, o).as_deref() == Some(id)))
    }

    async fn find_by_name(&self, kind: ComponentKind, name: &str) -> Result<Option<ConfigObject>, InstanceError> {
        self.read("find_by_name", kind, name)?;
        Ok(self.named(kind, name))
    }

    async fn add(&self, kind: ComponentKind, object: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        self.write("add", kind, &object.label())?;
        let mut stored = object.clone();
        if stored.id().is_none() && !matches!(kind, ComponentKind::Keystore) {
            stored.set("id", json!(self.next_id(&format!("{}-{}", self.host, kind.as_str()))));
        }
        if kind == ComponentKind::Application {
            let tracking = self.next_id(&format!("{}-trk", self.host));
            stored.set("trackingFieldId", json!(tracking));
            if let Some(fields) = stored.array_mut("fields") {
                fields.push(json!({"id": tracking, "name": "Tracking Id", "fieldType": "tracking"}));
            }
        }
        self.lock().objects.entry(kind).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, kind: ComponentKind, object: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        self.write("update", kind, &object.label())?;
        let key = key_of(kind, object);
        let mut state = self.lock();
        let slot = state
            .objects
            .entry(kind)
            .or_default()
            .iter_mut()
            .find(|o| key_of(kind, o) == key)
            .ok_or_else(|| InstanceError::Http {
                status: 404,
                message: "not found".into(),
            })?;
        *slot = object.clone();
        Ok(object.clone())
    }

    async fn list_workflows(&self) -> Result<Vec<ConfigObject>, InstanceError> {
        Ok(self.workflows())
    }

    async fn get_workflow(&self, application_id: &str) -> Result<Option<ConfigObject>, InstanceError> {
        self.read("get_workflow", ComponentKind::Application, application_id)?;
        Ok(self
            .workflows()
            .into_iter()
            .find(|w| w.str_field("applicationId") == Some(application_id)))
    }

    async fn add_workflow(&self, workflow: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let owner = workflow.str_field("applicationId").unwrap_or_default().to_string();
        self.write("add_workflow", ComponentKind::Application, &owner)?;
        let mut stored = workflow.clone();
        stored.set("id", json!(self.next_id("wf")));
        self.lock().workflows.push(stored.clone());
        Ok(stored)
    }

    async fn update_workflow(&self, workflow: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let owner = workflow.str_field("applicationId").unwrap_or_default().to_string();
        self.write("update_workflow", ComponentKind::Application, &owner)?;
        let mut state = self.lock();
        if let Some(slot) = state.workflows.iter_mut().find(|w| w.id() == workflow.id()) {
            *slot = workflow.clone();
        }
        Ok(workflow.clone())
    }

    async fn download_bundle(&self, file_id: &str) -> Result<Vec<u8>, InstanceError> {
        self.read("download_bundle", ComponentKind::Plugin, file_id)?;
        self.lock()
            .bundles
            .get(file_id)
            .cloned()
            .ok_or_else(|| InstanceError::Http {
                status: 404,
                message: "no such file".into(),
            })
    }

    async fn upload_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<ConfigObject, InstanceError> {
        self.install_bundle("upload_plugin", file_name, &bundle)
    }

    async fn upgrade_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<ConfigObject, InstanceError> {
        self.install_bundle("upgrade_plugin", file_name, &bundle)
    }

    async fn install_package(&self, package: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let name = package.label();
        let python = package.str_field("pythonVersion").map(str::to_string);
        let exists = self.objects(ComponentKind::Package).iter().any(|p| {
            p.name() == Some(name.as_str()) && p.str_field("pythonVersion").map(str::to_string) == python
        });
        self.write(if exists { "upgrade" } else { "add" }, ComponentKind::Package, &name)?;
        let mut state = self.lock();
        let packages = state.objects.entry(ComponentKind::Package).or_default();
        packages.retain(|p| {
            !(p.name() == Some(name.as_str()) && p.str_field("pythonVersion").map(str::to_string) == python)
        });
        packages.push(package.clone());
        Ok(package.clone())
    }
}

impl MemoryInstance {
    /// Install a plugin from its JSON bundle, assigning fresh destination ids
    fn install_bundle(&self, op: &'static str, file_name: &str, bundle: &[u8]) -> Result<ConfigObject, InstanceError> {
        let mut plugin: ConfigObject =
            serde_json::from_slice(bundle).map_err(|e| InstanceError::Decode(e.to_string()))?;
        let name = plugin.label();
        self.write(if op == "upload_plugin" { "add" } else { "upgrade" }, ComponentKind::Plugin, &name)?;
        assert!(file_name.ends_with(".swimbundle"), "unexpected bundle name {file_name}");

        plugin.set("id", json!(self.next_id("plugin")));
        plugin.set("fileId", json!(self.next_id("file")));
        if let Some(actions) = plugin.array_mut("availableActionDescriptors") {
            for action in actions.iter_mut() {
                action["id"] = json!(format!("dest-{}", action["id"].as_str().unwrap_or("act")));
                action["imageId"] = json!(format!("dest-{}", action["imageId"].as_str().unwrap_or("img")));
            }
        }
        let mut state = self.lock();
        let plugins = state.objects.entry(ComponentKind::Plugin).or_default();
        plugins.retain(|p| p.name() != Some(name.as_str()));
        plugins.push(plugin.clone());
        Ok(plugin)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const SOURCE_HOST: &str = "https://source.example.com";
pub const DESTINATION_HOST: &str = "https://destination.example.com";
pub const PLATFORM: &str = "10.5.0";

/// Plugin definition shared by the source listing and its bundle
pub fn virus_total_plugin() -> Value {
    json!({
        "id": "p-vt",
        "name": "sw_virus_total",
        "version": "1.2.0",
        "fileId": "file-vt",
        "compatibility": ">=10.0.0",
        "availableActionDescriptors": [
            {"actionType": "ScanUrl", "id": "act-scan", "imageId": "img-scan"}
        ]
    })
}

/// A source instance exercising every kind and every cross-reference
pub fn full_source() -> MemoryInstance {
    let plugin = virus_total_plugin();
    MemoryInstance::new(SOURCE_HOST, PLATFORM)
        .with(ComponentKind::Keystore, json!({"name": "vt_api_key"}))
        .with(ComponentKind::Package, json!({"name": "requests", "version": "2.31.0", "pythonVersion": "Python3"}))
        .with(ComponentKind::Plugin, plugin.clone())
        .with_bundle("file-vt", &plugin)
        .with(ComponentKind::Asset, json!({"id": "as-vt", "name": "VirusTotal", "host": "vt.example.com"}))
        .with(ComponentKind::Workspace, json!({
            "id": "ws-soc", "name": "SOC",
            "applications": ["app-alerts"], "dashboards": ["db-overview"]
        }))
        .with(ComponentKind::Applet, json!({"id": "ap-1", "name": "Timeline"}))
        .with(ComponentKind::Application, json!({
            "id": "app-alerts", "name": "Alerts",
            "$type": "Core.Models.Application.Application, Core",
            "trackingFieldId": "src-trk-alerts",
            "workspaces": ["ws-soc"],
            "permissions": [{"type": "role", "id": "role-analyst"}],
            "layout": [{"fieldId": "f-title"}],
            "fields": [
                {"id": "src-trk-alerts", "name": "Tracking Id", "fieldType": "tracking"},
                {"id": "f-title", "name": "Title", "fieldType": "text"},
                {"id": "f-case", "name": "Case", "fieldType": "reference",
                 "targetId": "app-cases", "columns": ["src-trk-cases", "f-summary"]}
            ]
        }))
        .with(ComponentKind::Application, json!({
            "id": "app-cases", "name": "Cases",
            "trackingFieldId": "src-trk-cases",
            "fields": [
                {"id": "src-trk-cases", "name": "Tracking Id", "fieldType": "tracking"},
                {"id": "f-summary", "name": "Summary", "fieldType": "text"}
            ]
        }))
        .with_workflow(json!({"id": "wf-src", "applicationId": "app-alerts", "stages": [{"name": "triage"}]}))
        .with(ComponentKind::Task, json!({
            "id": "t-scan", "name": "Scan URL", "uid": "uid-scan", "applicationId": "app-alerts",
            "action": {
                "assetId": "as-vt",
                "packageDescriptorId": "act-scan",
                "descriptor": {
                    "actionType": "ScanUrl",
                    "imageId": "img-scan",
                    "packageDescriptor": {"name": "sw_virus_total", "fileId": "file-vt"}
                }
            },
            "inputMapping": [{"key": "url", "value": "f-title"}],
            "outputs": [{"backReferenceFieldId": "src-trk-alerts", "mappings": [{"value": "f-title"}]}]
        }))
        .with(ComponentKind::Report, json!({"id": "r-open", "name": "Open cases", "applicationIds": ["app-cases"]}))
        .with(ComponentKind::Dashboard, json!({"id": "db-overview", "name": "Overview", "items": [{"reportId": "r-open"}]}))
        .with(ComponentKind::User, json!({
            "id": "u-ada", "name": "ada", "password": "hunter2",
            "roles": [{"id": "role-analyst", "name": "Analyst"}],
            "groups": [{"id": "grp-soc", "name": "SOC Team"}]
        }))
        .with(ComponentKind::Group, json!({
            "id": "grp-soc", "name": "SOC Team",
            "users": [{"id": "u-ada", "name": "ada"}], "groups": [], "roles": []
        }))
        .with(ComponentKind::Group, json!({"id": "grp-everyone", "name": "Everyone", "users": []}))
        .with(ComponentKind::Role, json!({
            "id": "role-analyst", "name": "Analyst",
            "users": [{"id": "u-ada", "name": "ada"}], "groups": []
        }))
}

pub fn empty_destination() -> MemoryInstance {
    MemoryInstance::new(DESTINATION_HOST, PLATFORM)
}

pub fn config(dry_run: bool) -> ConfigBuilder {
    ConfigBuilder::new()
        .source(SOURCE_HOST, "src-token")
        .destination(DESTINATION_HOST, "dest-token")
        .dry_run(dry_run)
        .update_reports(true)
        .update_dashboards(true)
}

pub fn engine(source: &Arc<MemoryInstance>, destination: &Arc<MemoryInstance>, config: &Config) -> SyncEngine {
    SyncEngine::new(source.clone(), destination.clone(), config).unwrap()
}

pub fn never_confirm(_: &tributary_sync::Preflight) -> bool {
    false
}
