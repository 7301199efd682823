use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outcome of walking a dotted field path through a resource tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Found(T),
    NotFound,
    /// The path exists but runs through (or ends at) a value of the wrong shape.
    TypeMismatch,
}

impl<T> FieldValue<T> {
    pub fn found(self) -> Option<T> {
        match self {
            FieldValue::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }

    fn and_then<U>(self, f: impl FnOnce(T) -> FieldValue<U>) -> FieldValue<U> {
        match self {
            FieldValue::Found(v) => f(v),
            FieldValue::NotFound => FieldValue::NotFound,
            FieldValue::TypeMismatch => FieldValue::TypeMismatch,
        }
    }
}

/// A cluster object of any kind, kept as a generic JSON tree.
///
/// Everything the engine needs is read through dotted paths
/// (`metadata.labels`, `status.phase`, `spec.ttlSeconds`, ...) so no
/// per-kind typed accessors exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Resource {
    object: Map<String, Value>,
}

impl TryFrom<Value> for Resource {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> anyhow::Result<Self> {
        Resource::from_value(value)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        Value::Object(resource.object)
    }
}

impl Resource {
    /// Wrap a JSON object. The object must carry `apiVersion`, `kind` and `metadata.name`.
    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let Value::Object(object) = value else {
            anyhow::bail!("resource must be a JSON object");
        };
        let resource = Self { object };
        if resource.api_version().is_empty() {
            anyhow::bail!("resource is missing apiVersion");
        }
        if resource.kind().is_empty() {
            anyhow::bail!("resource is missing kind");
        }
        if resource.name().is_empty() {
            anyhow::bail!("resource is missing metadata.name");
        }
        Ok(resource)
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.object
    }

    pub fn api_version(&self) -> &str {
        self.object
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.object
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name").unwrap_or_default()
    }

    /// Namespace of the object, `None` for cluster-scoped objects.
    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace").filter(|ns| !ns.is_empty())
    }

    pub fn uid(&self) -> Option<&str> {
        self.metadata_str("uid").filter(|uid| !uid.is_empty())
    }

    /// Stable identifier used in evaluation results: the UID when present,
    /// otherwise `namespace/name`.
    pub fn id(&self) -> String {
        match self.uid() {
            Some(uid) => uid.to_string(),
            None => self.qualified_name(),
        }
    }

    /// `namespace/name`, or just `name` for cluster-scoped objects.
    pub fn qualified_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name()),
            None => self.name().to_string(),
        }
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("annotations")
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata_map_value("labels", key)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata_map_value("annotations", key)
    }

    pub fn finalizers(&self) -> Vec<String> {
        self.metadata()
            .and_then(|m| m.get("finalizers"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn creation_timestamp(&self) -> FieldValue<DateTime<Utc>> {
        self.nested_timestamp("metadata.creationTimestamp")
    }

    pub fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        self.nested_timestamp("metadata.deletionTimestamp").found()
    }

    /// Walk a dotted path (`status.conditions.0.type`). Numeric segments index into arrays.
    /// A JSON `null` leaf counts as absent.
    pub fn lookup(&self, path: &str) -> FieldValue<&Value> {
        let mut segments = path.split('.');
        let Some(first) = segments.next().filter(|s| !s.is_empty()) else {
            return FieldValue::NotFound;
        };
        let Some(mut current) = self.object.get(first) else {
            return FieldValue::NotFound;
        };

        for segment in segments {
            current = match current {
                Value::Object(map) => match map.get(segment) {
                    Some(next) => next,
                    None => return FieldValue::NotFound,
                },
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(idx) => match items.get(idx) {
                        Some(next) => next,
                        None => return FieldValue::NotFound,
                    },
                    Err(_) => return FieldValue::TypeMismatch,
                },
                Value::Null => return FieldValue::NotFound,
                _ => return FieldValue::TypeMismatch,
            };
        }

        if current.is_null() {
            FieldValue::NotFound
        } else {
            FieldValue::Found(current)
        }
    }

    /// Scalar at `path` rendered as a string. Objects and arrays are a type mismatch.
    pub fn nested_string(&self, path: &str) -> FieldValue<String> {
        self.lookup(path).and_then(|value| match value {
            Value::String(s) => FieldValue::Found(s.clone()),
            Value::Number(n) => FieldValue::Found(n.to_string()),
            Value::Bool(b) => FieldValue::Found(b.to_string()),
            _ => FieldValue::TypeMismatch,
        })
    }

    /// Integer at `path`. Integer-valued strings (`"3600"`) are accepted.
    pub fn nested_i64(&self, path: &str) -> FieldValue<i64> {
        self.lookup(path).and_then(|value| match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Found(i),
                None => FieldValue::TypeMismatch,
            },
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => FieldValue::Found(i),
                Err(_) => FieldValue::TypeMismatch,
            },
            _ => FieldValue::TypeMismatch,
        })
    }

    /// RFC 3339 timestamp at `path`. Unparsable strings are a type mismatch.
    pub fn nested_timestamp(&self, path: &str) -> FieldValue<DateTime<Utc>> {
        self.lookup(path).and_then(|value| match value.as_str() {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => FieldValue::Found(ts.with_timezone(&Utc)),
                Err(_) => FieldValue::TypeMismatch,
            },
            None => FieldValue::TypeMismatch,
        })
    }

    // --- mutation helpers used by the API and the store-backed deleter ---

    pub fn set_uid(&mut self, uid: &str) {
        self.metadata_mut()
            .insert("uid".to_string(), Value::String(uid.to_string()));
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut()
            .insert("namespace".to_string(), Value::String(namespace.to_string()));
    }

    pub fn set_creation_timestamp(&mut self, ts: DateTime<Utc>) {
        self.metadata_mut()
            .insert("creationTimestamp".to_string(), Value::String(ts.to_rfc3339()));
    }

    pub fn set_deletion_timestamp(&mut self, ts: DateTime<Utc>) {
        self.metadata_mut()
            .insert("deletionTimestamp".to_string(), Value::String(ts.to_rfc3339()));
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        let metadata = self.metadata_mut();
        let annotations = metadata
            .entry("annotations")
            .or_insert_with(|| Value::Object(Map::new()));
        if !annotations.is_object() {
            *annotations = Value::Object(Map::new());
        }
        if let Value::Object(map) = annotations {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    /// Remove `finalizer` from `metadata.finalizers`. Returns true when it was present.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let Some(Value::Array(items)) = self.metadata_mut().get_mut("finalizers") else {
            return false;
        };
        let before = items.len();
        items.retain(|item| item.as_str() != Some(finalizer));
        items.len() != before
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.object.get("metadata").and_then(Value::as_object)
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        let metadata = self
            .object
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        match metadata {
            Value::Object(map) => map,
            _ => unreachable!("metadata was just normalised to an object"),
        }
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
    }

    fn metadata_map_value(&self, field: &str, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(Value::as_object)
            .and_then(|map| map.get(key))
            .and_then(Value::as_str)
    }

    fn string_map(&self, field: &str) -> BTreeMap<String, String> {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}
