//! HttpInstance - IInstanceAccessor implementation over HTTP
//!
//! Wraps the [`InstanceClient`] and the endpoint table to fulfil the
//! [`IInstanceAccessor`] port contract.
//!
//! ## Design Notes
//!
//! - List responses may be bare arrays or wrapped in an envelope object; the
//!   envelope keys per kind come from [`endpoints`](crate::endpoints).
//! - The keystore listing is a `{name: encrypted_value}` map and is turned
//!   into one `{"name": ...}` object per key. Values are never surfaced.
//! - Packages are listed once per Python interpreter and tagged with
//!   `pythonVersion` when the instance omits it.
//! - Adding a group that already exists answers 400 with code 1051; that is
//!   treated as success and the stored group is looked up by name.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use tributary_core::domain::{ComponentKind, ConfigObject};
use tributary_core::ports::{IInstanceAccessor, InstanceError};

use crate::client::InstanceClient;
use crate::endpoints::{self, endpoint, NameLookup, UpdateStyle};
use crate::ClientError;

/// Validation code returned when a group name is already taken
const GROUP_EXISTS_CODE: i64 = 1051;

/// HTTP-backed instance accessor
pub struct HttpInstance {
    client: InstanceClient,
}

impl HttpInstance {
    pub fn new(client: InstanceClient) -> Self {
        Self { client }
    }

    /// Borrow the underlying client
    pub fn client(&self) -> &InstanceClient {
        &self.client
    }

    async fn list_keystore(&self) -> Result<Vec<ConfigObject>, InstanceError> {
        let body = self.client.get_json(endpoint(ComponentKind::Keystore).list, &[]).await?;
        let keys: Vec<String> = match body {
            Some(Value::Object(map)) => map.into_iter().map(|(k, _)| k).collect(),
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    other => other.get("name").and_then(Value::as_str).map(str::to_string),
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(keys
            .into_iter()
            .map(|name| ConfigObject::new(json!({ "name": name })))
            .collect())
    }

    async fn list_packages(&self) -> Result<Vec<ConfigObject>, InstanceError> {
        let mut packages = Vec::new();
        for python in endpoints::PYTHON_VERSIONS.iter().copied() {
            let body = self.client.get_json(&["pip", "packages", python], &[]).await?;
            for mut item in unwrap_list(body, &[])? {
                if item.get("pythonVersion").is_none() {
                    item.set("pythonVersion", json!(python));
                }
                packages.push(item);
            }
        }
        Ok(packages)
    }

    async fn scan_by_name(&self, kind: ComponentKind, name: &str) -> Result<Option<ConfigObject>, InstanceError> {
        Ok(self
            .list(kind)
            .await?
            .into_iter()
            .find(|obj| obj.name() == Some(name)))
    }
}

#[async_trait]
impl IInstanceAccessor for HttpInstance {
    fn host(&self) -> &str {
        self.client.host()
    }

    async fn product_version(&self) -> Result<String, InstanceError> {
        let body = self.client.get_json(endpoints::VERSION, &[]).await?;
        match body {
            Some(Value::String(version)) => Ok(version),
            Some(Value::Object(map)) => ["productVersion", "version"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .ok_or_else(|| InstanceError::Decode("version response has no productVersion".into())),
            _ => Err(InstanceError::Decode("empty version response".into())),
        }
    }

    async fn list(&self, kind: ComponentKind) -> Result<Vec<ConfigObject>, InstanceError> {
        debug!(kind = %kind, host = %self.host(), "Listing");
        match kind {
            ComponentKind::Keystore => self.list_keystore().await,
            ComponentKind::Package => self.list_packages().await,
            _ => {
                let ep = endpoint(kind);
                let body = self.client.get_json(ep.list, &[]).await?;
                unwrap_list(body, ep.envelope)
            }
        }
    }

    async fn get(&self, kind: ComponentKind, id: &str) -> Result<Option<ConfigObject>, InstanceError> {
        match kind {
            ComponentKind::Package => self.scan_by_name(kind, id).await,
            ComponentKind::Keystore => {
                let found = self.list_keystore().await?;
                Ok(found.into_iter().find(|k| k.name() == Some(id)))
            }
            _ => {
                let segments = join(endpoint(kind).item, id);
                let body = self.client.get_json(&segments, &[]).await?;
                Ok(body.map(ConfigObject::new))
            }
        }
    }

    async fn find_by_name(&self, kind: ComponentKind, name: &str) -> Result<Option<ConfigObject>, InstanceError> {
        match endpoint(kind).lookup {
            NameLookup::Scan => self.scan_by_name(kind, name).await,
            NameLookup::Item => self.get(kind, name).await,
            NameLookup::Query { segments, param } => {
                let body = self.client.get_json(segments, &[(param, name)]).await?;
                Ok(first_named(body, name))
            }
            NameLookup::Search { segments } => {
                let body = self
                    .client
                    .get_json(segments, &[("searchFieldName", "name"), ("searchValue", name)])
                    .await?;
                Ok(first_named(body, name))
            }
        }
    }

    async fn add(&self, kind: ComponentKind, object: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        if kind == ComponentKind::Package {
            return self.install_package(object).await;
        }
        if kind == ComponentKind::Plugin {
            return Err(InstanceError::Unsupported(
                "plugins are installed from bundles".into(),
            ));
        }
        let ep = endpoint(kind);
        let result = self
            .client
            .send_json(Method::POST, ep.create, object.as_value())
            .await;
        match result {
            Ok(body) => Ok(body.map(ConfigObject::new).unwrap_or_else(|| object.clone())),
            Err(ClientError::Status {
                status: 400,
                code: Some(GROUP_EXISTS_CODE),
                ..
            }) if kind == ComponentKind::Group => {
                let name = object.label();
                info!(group = %name, "Group already exists, treating add as success");
                Ok(self
                    .find_by_name(kind, &name)
                    .await?
                    .unwrap_or_else(|| object.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, kind: ComponentKind, object: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let ep = endpoint(kind);
        let segments = match ep.update {
            UpdateStyle::Collection => ep.create.to_vec(),
            UpdateStyle::Item => {
                let id = object
                    .id()
                    .ok_or_else(|| InstanceError::Other(format!("{kind} update without id")))?;
                join(ep.item, id)
            }
            UpdateStyle::Unsupported => {
                return Err(InstanceError::Unsupported(format!("{kind} cannot be updated")))
            }
        };
        let body = self
            .client
            .send_json(Method::PUT, &segments, object.as_value())
            .await?;
        Ok(body.map(ConfigObject::new).unwrap_or_else(|| object.clone()))
    }

    async fn list_workflows(&self) -> Result<Vec<ConfigObject>, InstanceError> {
        let body = self.client.get_json(endpoints::WORKFLOW, &[]).await?;
        unwrap_list(body, &[])
    }

    async fn get_workflow(&self, application_id: &str) -> Result<Option<ConfigObject>, InstanceError> {
        let body = self.client.get_json(&["workflow", application_id], &[]).await?;
        Ok(body.map(ConfigObject::new))
    }

    async fn add_workflow(&self, workflow: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let body = self
            .client
            .send_json(Method::POST, endpoints::WORKFLOW, workflow.as_value())
            .await?;
        Ok(body.map(ConfigObject::new).unwrap_or_else(|| workflow.clone()))
    }

    async fn update_workflow(&self, workflow: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let id = workflow
            .id()
            .ok_or_else(|| InstanceError::Other("workflow update without id".into()))?;
        let body = self
            .client
            .send_json(Method::PUT, &["workflow", id], workflow.as_value())
            .await?;
        Ok(body.map(ConfigObject::new).unwrap_or_else(|| workflow.clone()))
    }

    async fn download_bundle(&self, file_id: &str) -> Result<Vec<u8>, InstanceError> {
        let segments = join(endpoints::BUNDLE_DOWNLOAD, file_id);
        Ok(self.client.get_bytes(&segments).await?)
    }

    async fn upload_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<ConfigObject, InstanceError> {
        let body = self
            .client
            .post_file(endpoint(ComponentKind::Plugin).create, file_name, bundle)
            .await?;
        Ok(ConfigObject::new(body.unwrap_or(Value::Null)))
    }

    async fn upgrade_plugin(&self, file_name: &str, bundle: Vec<u8>) -> Result<ConfigObject, InstanceError> {
        let body = self
            .client
            .post_file(endpoints::PLUGIN_UPGRADE, file_name, bundle)
            .await?;
        Ok(ConfigObject::new(body.unwrap_or(Value::Null)))
    }

    async fn install_package(&self, package: &ConfigObject) -> Result<ConfigObject, InstanceError> {
        let mut body = Map::new();
        for key in ["name", "version", "pythonVersion"] {
            if let Some(value) = package.get(key) {
                body.insert(key.to_string(), value.clone());
            }
        }
        let body = Value::Object(body);
        let reply = self
            .client
            .send_json(Method::POST, endpoint(ComponentKind::Package).create, &body)
            .await?;
        Ok(ConfigObject::new(reply.unwrap_or(body)))
    }
}

/// `base` followed by one dynamic segment
fn join<'a>(base: &[&'a str], last: &'a str) -> Vec<&'a str> {
    let mut segments = base.to_vec();
    segments.push(last);
    segments
}

/// Unwrap a list response that may be a bare array or an envelope object
fn unwrap_list(body: Option<Value>, envelope: &[&str]) -> Result<Vec<ConfigObject>, InstanceError> {
    let items = match body {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut map)) => {
            let key = envelope
                .iter()
                .chain(std::iter::once(&"items"))
                .find(|k| map.get(**k).map_or(false, Value::is_array));
            match key.and_then(|k| map.remove(*k)) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(InstanceError::Decode(
                        "list response has no recognizable array".into(),
                    ))
                }
            }
        }
        Some(other) => {
            return Err(InstanceError::Decode(format!(
                "expected a list, got {}",
                type_name(&other)
            )))
        }
    };
    Ok(items.into_iter().map(ConfigObject::new).collect())
}

/// First object named `name` in a lookup reply (array, envelope or single object)
fn first_named(body: Option<Value>, name: &str) -> Option<ConfigObject> {
    let candidates = match body? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("items".to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };
    candidates
        .into_iter()
        .map(ConfigObject::new)
        .find(|obj| obj.name() == Some(name))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
