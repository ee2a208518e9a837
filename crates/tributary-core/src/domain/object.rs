//! Configuration objects
//!
//! A [`ConfigObject`] is an opaque JSON record read from an instance. The engine
//! only interprets the handful of keys it needs for identity, ordering and
//! cross-reference rewriting; everything else is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that differ between instances without the object being materially different
pub const VOLATILE_KEYS: &[&str] = &[
    "id",
    "version",
    "createdDate",
    "modifiedDate",
    "createdByUser",
    "modifiedByUser",
    "lastModified",
];

/// Serialization type discriminator stripped by [`ConfigObject::normalize`]
pub const TYPE_DISCRIMINATOR: &str = "$type";

/// An opaque configuration record fetched from an instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigObject(Value);

impl ConfigObject {
    /// Wrap a JSON value
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The object's `id`, when it is a string
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// Display name: `name`, falling back to `displayName` then `userName`
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
            .or_else(|| self.str_field("displayName"))
            .or_else(|| self.str_field("userName"))
    }

    /// Name if present, otherwise id, otherwise `"<unnamed>"`
    #[must_use]
    pub fn label(&self) -> String {
        self.name()
            .or_else(|| self.id())
            .unwrap_or("<unnamed>")
            .to_string()
    }

    /// Version, accepting either a string or a number on the wire
    #[must_use]
    pub fn version(&self) -> Option<String> {
        match self.0.get("version")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Stable cross-instance identifier used by tasks
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.str_field("uid")
    }

    /// Borrow a top-level key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow a top-level key as a string
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Borrow a nested value by JSON pointer (`/action/descriptor/imageId`)
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    /// Mutably borrow a nested value by JSON pointer
    pub fn pointer_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        self.0.pointer_mut(pointer)
    }

    /// Set a top-level key. No-op when the object is not a JSON object.
    pub fn set(&mut self, key: &str, value: Value) {
        if let Some(map) = self.0.as_object_mut() {
            map.insert(key.to_string(), value);
        }
    }

    /// Remove a top-level key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.as_object_mut().and_then(|map| map.remove(key))
    }

    /// Ids referenced under `key`.
    ///
    /// Accepts an array of id strings or an array of objects carrying an `id`.
    #[must_use]
    pub fn id_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(reference_id).collect(),
            _ => Vec::new(),
        }
    }

    /// Array under `key`, or an empty slice
    #[must_use]
    pub fn array(&self, key: &str) -> &[Value] {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    /// Mutable array under `key`, if present
    pub fn array_mut(&mut self, key: &str) -> Option<&mut Vec<Value>> {
        self.0.get_mut(key).and_then(Value::as_array_mut)
    }

    /// Borrow the underlying JSON value
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying JSON value
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Strip `$type` discriminators at every depth
    pub fn normalize(&mut self) {
        strip_key_recursive(&mut self.0, TYPE_DISCRIMINATOR);
    }

    /// Normalized copy with volatile top-level keys removed
    #[must_use]
    pub fn material(&self) -> Value {
        let mut copy = self.clone();
        copy.normalize();
        if let Some(map) = copy.0.as_object_mut() {
            for key in VOLATILE_KEYS {
                map.remove(*key);
            }
        }
        copy.0
    }

    /// Whether the two objects differ once volatile metadata is ignored
    #[must_use]
    pub fn differs_from(&self, other: &ConfigObject) -> bool {
        self.material() != other.material()
    }
}

impl From<Value> for ConfigObject {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Map<String, Value>> for ConfigObject {
    fn from(map: Map<String, Value>) -> Self {
        Self(Value::Object(map))
    }
}

fn reference_id(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn strip_key_recursive(value: &mut Value, key: &str) {
    match value {
        Value::Object(map) => {
            map.remove(key);
            for child in map.values_mut() {
                strip_key_recursive(child, key);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_key_recursive(child, key);
            }
        }
        _ => {}
    }
}
