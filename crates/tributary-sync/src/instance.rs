//! Executor-wrapped instance handle
//!
//! [`Instance`] pairs an [`IInstanceAccessor`] with the run's [`CallExecutor`]
//! and its role. Every method issues exactly one accessor call through the
//! executor, except [`Instance::locate`], which composes two lookups.
//!
//! Successful single-object responses are archived under the instance's role;
//! payloads about to be written are archived under `altered`.

use std::sync::Arc;

use tributary_core::domain::{ComponentKind, ConfigObject, InstanceRole};
use tributary_core::ports::IInstanceAccessor;

use crate::executor::{Call, CallExecutor, Lookup};
use crate::SyncError;

const WORKFLOWS: &str = "workflows";

/// One side of a run, as seen by the reconcilers
#[derive(Clone)]
pub struct Instance {
    role: InstanceRole,
    accessor: Arc<dyn IInstanceAccessor>,
    executor: Arc<CallExecutor>,
}

impl Instance {
    pub fn new(
        role: InstanceRole,
        accessor: Arc<dyn IInstanceAccessor>,
        executor: Arc<CallExecutor>,
    ) -> Self {
        Self {
            role,
            accessor,
            executor,
        }
    }

    pub fn role(&self) -> InstanceRole {
        self.role
    }

    pub fn host(&self) -> &str {
        self.accessor.host()
    }

    pub fn executor(&self) -> &Arc<CallExecutor> {
        &self.executor
    }

    fn call(&self, function: &'static str, target: String) -> Call<'_> {
        Call {
            function,
            role: self.role,
            host: self.accessor.host(),
            target,
        }
    }

    fn keep(&self, resource: &str, object: &ConfigObject) {
        self.executor.archive(self.role.as_str(), resource, object);
    }

    fn keep_lookup(&self, resource: &str, lookup: &Lookup) {
        if let Lookup::Found(object) = lookup {
            self.keep(resource, object);
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn product_version(&self) -> Result<Option<String>, SyncError> {
        let call = self.call("product_version", "platform".to_string());
        self.executor
            .execute(&call, self.accessor.product_version())
            .await
    }

    pub async fn list(&self, kind: ComponentKind) -> Result<Option<Vec<ConfigObject>>, SyncError> {
        let call = self.call("list", kind.as_str().to_string());
        self.executor.execute(&call, self.accessor.list(kind)).await
    }

    pub async fn get(&self, kind: ComponentKind, id: &str) -> Result<Lookup, SyncError> {
        let call = self.call("get", format!("{kind}/{id}"));
        let lookup = self.executor.lookup(&call, self.accessor.get(kind, id)).await?;
        self.keep_lookup(kind.as_str(), &lookup);
        Ok(lookup)
    }

    pub async fn find_by_name(&self, kind: ComponentKind, name: &str) -> Result<Lookup, SyncError> {
        let call = self.call("find_by_name", format!("{kind}/{name}"));
        let lookup = self
            .executor
            .lookup(&call, self.accessor.find_by_name(kind, name))
            .await?;
        self.keep_lookup(kind.as_str(), &lookup);
        Ok(lookup)
    }

    /// Find the counterpart of a source object.
    ///
    /// Kinds keyed by name are looked up by name. Other kinds are looked up by
    /// id first, falling back to the name when the id lookup is undecodable
    /// or there is no id to look up.
    pub async fn locate(
        &self,
        kind: ComponentKind,
        id: Option<&str>,
        name: &str,
    ) -> Result<Lookup, SyncError> {
        if kind.keyed_by_name() {
            return self.find_by_name(kind, name).await;
        }
        match id {
            Some(id) => match self.get(kind, id).await? {
                Lookup::Undecodable => self.find_by_name(kind, name).await,
                other => Ok(other),
            },
            None => self.find_by_name(kind, name).await,
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn add(&self, kind: ComponentKind, object: &ConfigObject) -> Result<Option<ConfigObject>, SyncError> {
        self.executor.archive("altered", kind.as_str(), object);
        let call = self.call("add", format!("{kind}/{}", object.label()));
        let added = self.executor.execute(&call, self.accessor.add(kind, object)).await?;
        if let Some(added) = &added {
            self.keep(kind.as_str(), added);
        }
        Ok(added)
    }

    pub async fn update(&self, kind: ComponentKind, object: &ConfigObject) -> Result<Option<ConfigObject>, SyncError> {
        self.executor.archive("altered", kind.as_str(), object);
        let call = self.call("update", format!("{kind}/{}", object.label()));
        let updated = self
            .executor
            .execute(&call, self.accessor.update(kind, object))
            .await?;
        if let Some(updated) = &updated {
            self.keep(kind.as_str(), updated);
        }
        Ok(updated)
    }

    // ========================================================================
    // Workflows
    // ========================================================================

    pub async fn get_workflow(&self, application_id: &str) -> Result<Lookup, SyncError> {
        let call = self.call("get_workflow", format!("{WORKFLOWS}/{application_id}"));
        let lookup = self
            .executor
            .lookup(&call, self.accessor.get_workflow(application_id))
            .await?;
        self.keep_lookup(WORKFLOWS, &lookup);
        Ok(lookup)
    }

    pub async fn add_workflow(&self, workflow: &ConfigObject) -> Result<Option<ConfigObject>, SyncError> {
        self.executor.archive("altered", WORKFLOWS, workflow);
        let call = self.call("add_workflow", format!("{WORKFLOWS}/{}", workflow.label()));
        self.executor
            .execute(&call, self.accessor.add_workflow(workflow))
            .await
    }

    pub async fn update_workflow(&self, workflow: &ConfigObject) -> Result<Option<ConfigObject>, SyncError> {
        self.executor.archive("altered", WORKFLOWS, workflow);
        let call = self.call("update_workflow", format!("{WORKFLOWS}/{}", workflow.label()));
        self.executor
            .execute(&call, self.accessor.update_workflow(workflow))
            .await
    }

    // ========================================================================
    // Plugins and packages
    // ========================================================================

    pub async fn download_bundle(&self, plugin: &str, file_id: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let call = self.call("download_bundle", format!("plugins/{plugin}"));
        self.executor
            .execute(&call, self.accessor.download_bundle(file_id))
            .await
    }

    pub async fn upload_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<Option<ConfigObject>, SyncError> {
        let call = self.call("upload_plugin", format!("plugins/{file_name}"));
        self.executor
            .execute(&call, self.accessor.upload_plugin(file_name, bundle))
            .await
    }

    pub async fn upgrade_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<Option<ConfigObject>, SyncError> {
        let call = self.call("upgrade_plugin", format!("plugins/{file_name}"));
        self.executor
            .execute(&call, self.accessor.upgrade_plugin(file_name, bundle))
            .await
    }

    pub async fn install_package(&self, package: &ConfigObject) -> Result<Option<ConfigObject>, SyncError> {
        self.executor.archive("altered", ComponentKind::Package.as_str(), package);
        let call = self.call("install_package", format!("packages/{}", package.label()));
        self.executor
            .execute(&call, self.accessor.install_package(package))
            .await
    }
}
