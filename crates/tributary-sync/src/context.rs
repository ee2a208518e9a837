//! Per-run shared state
//!
//! A [`RunContext`] is created by the engine for one run and handed to every
//! reconciler. It owns the two executor-wrapped instances, the run settings,
//! the filter, and the bookkeeping shared between reconcilers:
//!
//! - the diff recorder and homework list
//! - the tracking id map (source tracking id → destination tracking id)
//! - the memo of processed `(kind, source id)` pairs, which makes re-entrant
//!   single-object syncs idempotent
//! - identities of name-keyed objects (source id → destination id)
//! - caches of source listings and fetched source objects
//! - the destination plugin index used to re-wire tasks
//! - applications whose columns still need rewriting, and directory objects
//!   to apply again once their references exist
//!
//! All of it sits behind `std::sync::Mutex`; no lock is held across an
//! `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};
use tributary_audit::OutputLog;
use tributary_core::config::SyncConfig;
use tributary_core::domain::{
    ComponentFilter, ComponentKind, ConfigObject, DiffEntry, HomeworkList, TrackingIdMap,
    TrackingInsert,
};

use crate::executor::Lookup;
use crate::instance::Instance;
use crate::recorder::DiffRecorder;
use crate::SyncError;

/// Key holding an application's tracking field id
pub const TRACKING_FIELD_ID: &str = "trackingFieldId";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// RunSettings
// ============================================================================

/// Engine switches for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    pub dry_run: bool,
    pub offline: bool,
    pub update_reports: bool,
    pub update_dashboards: bool,
    pub update_default_reports: bool,
    pub continue_on_error: bool,
    pub mirror_app_fields: bool,
    pub use_unsupported_version: bool,
    pub force_unsupported_version: bool,
}

impl From<&SyncConfig> for RunSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            offline: config.offline,
            update_reports: config.update_reports,
            update_dashboards: config.update_dashboards,
            update_default_reports: config.update_default_reports,
            continue_on_error: config.continue_on_error,
            mirror_app_fields: config.mirror_app_fields,
            use_unsupported_version: config.use_unsupported_version,
            force_unsupported_version: config.force_unsupported_version,
        }
    }
}

impl RunSettings {
    /// Names of the enabled options, as used by platform caveats
    pub fn enabled_options(&self) -> Vec<&'static str> {
        [
            ("dry_run", self.dry_run),
            ("offline", self.offline),
            ("update_reports", self.update_reports),
            ("update_dashboards", self.update_dashboards),
            ("update_default_reports", self.update_default_reports),
            ("continue_on_error", self.continue_on_error),
            ("mirror_app_fields", self.mirror_app_fields),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }
}

// ============================================================================
// Plugin index
// ============================================================================

/// Destination ids of one plugin action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionIds {
    pub id: String,
    pub image_id: Option<String>,
}

/// Destination ids of one installed plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginIds {
    pub file_id: Option<String>,
    /// Keyed by action type
    pub actions: HashMap<String, ActionIds>,
}

impl PluginIds {
    /// Read the ids out of a full plugin record
    pub fn from_plugin(plugin: &ConfigObject) -> Self {
        let actions = plugin
            .array("availableActionDescriptors")
            .iter()
            .filter_map(|action| {
                let action_type = action.get("actionType")?.as_str()?;
                let id = action.get("id")?.as_str()?;
                let image_id = action
                    .get("imageId")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some((
                    action_type.to_string(),
                    ActionIds {
                        id: id.to_string(),
                        image_id,
                    },
                ))
            })
            .collect();
        Self {
            file_id: plugin.str_field("fileId").map(str::to_string),
            actions,
        }
    }
}

/// Installed destination plugins by name
pub type PluginIndex = HashMap<String, PluginIds>;

// ============================================================================
// RunContext
// ============================================================================

/// State shared by every reconciler during one run
pub struct RunContext {
    pub source: Instance,
    pub destination: Instance,
    pub settings: RunSettings,
    pub filter: ComponentFilter,
    pub recorder: DiffRecorder,
    requested: Vec<ComponentKind>,
    destination_version: String,
    homework: Arc<Mutex<HomeworkList>>,
    tracking: Mutex<TrackingIdMap>,
    processed: Mutex<HashSet<(ComponentKind, String)>>,
    identities: Mutex<HashMap<(ComponentKind, String), String>>,
    source_index: Mutex<HashMap<ComponentKind, Arc<Vec<ConfigObject>>>>,
    source_objects: Mutex<HashMap<(ComponentKind, String), ConfigObject>>,
    plugin_index: Mutex<Option<Arc<PluginIndex>>>,
    pending_rewrites: Mutex<Vec<String>>,
    deferred: Mutex<Vec<(ComponentKind, String)>>,
}

impl RunContext {
    pub fn new(
        source: Instance,
        destination: Instance,
        settings: RunSettings,
        filter: ComponentFilter,
        requested: &[ComponentKind],
        destination_version: impl Into<String>,
        homework: Arc<Mutex<HomeworkList>>,
    ) -> Self {
        Self {
            source,
            destination,
            settings,
            filter,
            recorder: DiffRecorder::new(),
            requested: requested.to_vec(),
            destination_version: destination_version.into(),
            homework,
            tracking: Mutex::new(TrackingIdMap::new()),
            processed: Mutex::new(HashSet::new()),
            identities: Mutex::new(HashMap::new()),
            source_index: Mutex::new(HashMap::new()),
            source_objects: Mutex::new(HashMap::new()),
            plugin_index: Mutex::new(None),
            pending_rewrites: Mutex::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.settings.dry_run
    }

    pub fn log(&self) -> &Arc<OutputLog> {
        self.destination.executor().log()
    }

    pub fn destination_version(&self) -> &str {
        &self.destination_version
    }

    /// Whether `kind` was asked for, as opposed to reached through a
    /// dependency of another kind
    pub fn requested(&self, kind: ComponentKind) -> bool {
        self.requested.contains(&kind)
    }

    /// Record a dry-run diff entry
    pub fn record(&self, entry: DiffEntry) {
        self.recorder.record(entry);
    }

    // ========================================================================
    // Filter and memo
    // ========================================================================

    /// Whether `name` of `kind` passes the run filter
    pub fn allows(&self, kind: ComponentKind, name: &str) -> bool {
        let allowed = self.filter.allows(kind, name);
        if !allowed {
            debug!(%kind, name, "Skipping excluded object");
            self.log().info(format!("Skipping {} '{name}': excluded", kind.title()));
        }
        allowed
    }

    /// Mark `(kind, id)` as processed. Returns `false` when it already was.
    pub fn begin(&self, kind: ComponentKind, id: &str) -> bool {
        lock(&self.processed).insert((kind, id.to_string()))
    }

    /// Whether `(kind, id)` has been started in this run
    pub fn is_begun(&self, kind: ComponentKind, id: &str) -> bool {
        lock(&self.processed).contains(&(kind, id.to_string()))
    }

    /// Admit a source object into a single-object sync.
    ///
    /// Resolves the name through the source index, applies the filter, then
    /// the memo. Returns the name to use, or `None` when the object is to be
    /// skipped. No call is made for the object itself, and an id the index
    /// cannot name is skipped since the filter cannot be applied to it.
    pub async fn admit(&self, kind: ComponentKind, id: &str) -> Result<Option<String>, SyncError> {
        let Some(name) = self.source_name(kind, id).await? else {
            warn!(%kind, id, "Skipping object missing from the source listing");
            self.log()
                .warning(format!("Skipping {} '{id}': not in the source listing", kind.title()));
            return Ok(None);
        };
        if !self.allows(kind, &name) {
            return Ok(None);
        }
        if !self.begin(kind, id) {
            debug!(%kind, id, "Already processed");
            return Ok(None);
        }
        Ok(Some(name))
    }

    // ========================================================================
    // Homework
    // ========================================================================

    pub fn homework(&self, kind: ComponentKind, text: impl Into<String>) {
        let text = text.into();
        info!(%kind, homework = %text, "Manual follow-up required");
        self.log().warning(format!("Homework ({}): {text}", kind.heading()));
        lock(&self.homework).add(kind, text);
    }

    pub fn homework_snapshot(&self) -> HomeworkList {
        lock(&self.homework).clone()
    }

    // ========================================================================
    // Tracking ids and identities
    // ========================================================================

    /// Record a source → destination tracking id correlation
    pub fn track(&self, source_id: &str, destination_id: &str) {
        let outcome = lock(&self.tracking).insert(source_id, destination_id);
        match outcome {
            TrackingInsert::Inserted => {
                debug!(source_id, destination_id, "Tracking id correlated");
            }
            TrackingInsert::Unchanged => {}
            TrackingInsert::Conflict { existing } => {
                warn!(source_id, destination_id, %existing, "Conflicting tracking id ignored");
                self.log().warning(format!(
                    "Tracking id '{source_id}' already maps to '{existing}', ignoring '{destination_id}'"
                ));
            }
        }
    }

    /// Destination tracking id for `source_id`, if known
    pub fn translate(&self, source_id: &str) -> Option<String> {
        lock(&self.tracking).get(source_id).map(str::to_string)
    }

    pub fn tracking_snapshot(&self) -> TrackingIdMap {
        lock(&self.tracking).clone()
    }

    /// Remember the destination id of a name-keyed object
    pub fn map_identity(&self, kind: ComponentKind, source_id: &str, destination_id: &str) {
        lock(&self.identities).insert((kind, source_id.to_string()), destination_id.to_string());
    }

    pub fn identity(&self, kind: ComponentKind, source_id: &str) -> Option<String> {
        lock(&self.identities)
            .get(&(kind, source_id.to_string()))
            .cloned()
    }

    /// Destination id of a name-keyed source object.
    ///
    /// Falls back to a destination name lookup for objects this run did not
    /// reconcile, such as built-ins present on both sides.
    pub async fn resolve_identity(
        &self,
        kind: ComponentKind,
        source_id: &str,
    ) -> Result<Option<String>, SyncError> {
        if let Some(known) = self.identity(kind, source_id) {
            return Ok(Some(known));
        }
        let Some(name) = self.source_name(kind, source_id).await? else {
            return Ok(None);
        };
        let found = self.destination.find_by_name(kind, &name).await?.found();
        let destination_id = found.as_ref().and_then(ConfigObject::id).map(str::to_string);
        if let Some(destination_id) = &destination_id {
            self.map_identity(kind, source_id, destination_id);
        }
        Ok(destination_id)
    }

    /// Destination tracking id for a source tracking id.
    ///
    /// Ids not yet correlated are resolved through the owning source
    /// application and its destination counterpart. Ids that belong to no
    /// known application come back as `None`.
    pub async fn resolve_tracking(&self, source_id: &str) -> Result<Option<String>, SyncError> {
        if let Some(known) = self.translate(source_id) {
            return Ok(Some(known));
        }
        let applications = self.source_index(ComponentKind::Application).await?;
        let Some(owner) = applications
            .iter()
            .find(|app| app.str_field(TRACKING_FIELD_ID) == Some(source_id))
        else {
            return Ok(None);
        };
        let counterpart = self
            .destination
            .locate(ComponentKind::Application, owner.id(), &owner.label())
            .await?
            .found();
        let resolved = counterpart
            .as_ref()
            .and_then(|app| app.str_field(TRACKING_FIELD_ID))
            .map(str::to_string);
        if let Some(resolved) = &resolved {
            self.track(source_id, resolved);
        }
        Ok(resolved)
    }

    // ========================================================================
    // Source caches
    // ========================================================================

    /// Source listing for `kind`, fetched once per run.
    ///
    /// A swallowed listing failure yields an empty list.
    pub async fn source_index(&self, kind: ComponentKind) -> Result<Arc<Vec<ConfigObject>>, SyncError> {
        let cached = lock(&self.source_index).get(&kind).cloned();
        if let Some(index) = cached {
            return Ok(index);
        }
        let listed = Arc::new(self.source.list(kind).await?.unwrap_or_default());
        lock(&self.source_index)
            .entry(kind)
            .or_insert_with(|| listed.clone());
        Ok(listed)
    }

    /// Name of the listed source object with `id`
    pub async fn source_name(&self, kind: ComponentKind, id: &str) -> Result<Option<String>, SyncError> {
        let index = self.source_index(kind).await?;
        Ok(index
            .iter()
            .find(|entry| entry.id() == Some(id))
            .and_then(ConfigObject::name)
            .map(str::to_string))
    }

    /// Full source object, fetched once per run.
    ///
    /// A listed object the source no longer returns is reported as
    /// [`SyncError::ComponentNotFound`] under the continue-on-error policy.
    pub async fn fetch_source(
        &self,
        kind: ComponentKind,
        id: &str,
        label: &str,
    ) -> Result<Option<ConfigObject>, SyncError> {
        let key = (kind, id.to_string());
        let cached = lock(&self.source_objects).get(&key).cloned();
        if let Some(object) = cached {
            return Ok(Some(object));
        }
        match self.source.get(kind, id).await? {
            Lookup::Found(object) => {
                if let Some(name) = object.name() {
                    if !self.filter.allows(kind, name) {
                        return Ok(None);
                    }
                }
                lock(&self.source_objects).insert(key, object.clone());
                Ok(Some(object))
            }
            Lookup::Missing | Lookup::Undecodable => {
                self.not_found(kind, label)?;
                Ok(None)
            }
            Lookup::Failed => Ok(None),
        }
    }

    fn not_found(&self, kind: ComponentKind, target: &str) -> Result<(), SyncError> {
        let error = SyncError::ComponentNotFound {
            kind,
            target: target.to_string(),
        };
        self.log().error(error.to_string());
        if self.settings.continue_on_error {
            warn!(%kind, target, "Source object not found, continuing");
            Ok(())
        } else {
            Err(error)
        }
    }

    // ========================================================================
    // Plugin index
    // ========================================================================

    /// Installed destination plugins, built on first use
    pub async fn plugin_index(&self) -> Result<Arc<PluginIndex>, SyncError> {
        let cached = lock(&self.plugin_index).clone();
        if let Some(index) = cached {
            return Ok(index);
        }

        let mut index = PluginIndex::new();
        let listed = self
            .destination
            .list(ComponentKind::Plugin)
            .await?
            .unwrap_or_default();
        for plugin in &listed {
            let Some(name) = plugin.name() else {
                continue;
            };
            if let Lookup::Found(full) = self
                .destination
                .find_by_name(ComponentKind::Plugin, name)
                .await?
            {
                index.insert(name.to_string(), PluginIds::from_plugin(&full));
            }
        }
        debug!(plugins = index.len(), "Destination plugin index built");

        let index = Arc::new(index);
        *lock(&self.plugin_index) = Some(index.clone());
        Ok(index)
    }

    /// Drop the plugin index after plugins were installed or upgraded
    pub fn invalidate_plugin_index(&self) {
        lock(&self.plugin_index).take();
    }

    // ========================================================================
    // Application rewrite queue
    // ========================================================================

    /// Queue an application for the tracking-id rewrite pass
    pub fn queue_rewrite(&self, application_id: &str) {
        let mut pending = lock(&self.pending_rewrites);
        if !pending.iter().any(|id| id == application_id) {
            pending.push(application_id.to_string());
        }
    }

    pub fn take_rewrites(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.pending_rewrites))
    }

    // ========================================================================
    // Deferred directory objects
    // ========================================================================

    /// Queue an object to be applied again once the references it had to
    /// drop exist on the destination
    pub fn defer(&self, kind: ComponentKind, id: &str) {
        let mut deferred = lock(&self.deferred);
        if !deferred.iter().any(|(k, i)| *k == kind && i == id) {
            deferred.push((kind, id.to_string()));
        }
    }

    pub fn take_deferred(&self) -> Vec<(ComponentKind, String)> {
        std::mem::take(&mut *lock(&self.deferred))
    }
}
