//! Documents and the writes that produce them.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::clock::Timestamp;
use crate::error::{Result, StoreError};
use crate::path::DocPath;

/// A stored document: its path, its JSON fields and the sequence number the
/// store assigned when the document was first created.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: DocPath,
    fields: Map<String, Value>,
    seq: u64,
}

impl Document {
    pub(crate) fn new(path: DocPath, fields: Map<String, Value>, seq: u64) -> Self {
        Self { path, fields, seq }
    }

    pub fn path(&self) -> &DocPath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Creation order within the store; breaks ties between equal
    /// timestamps.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_timestamp(&self, field: &str) -> Option<Timestamp> {
        self.get(field)
            .and_then(Value::as_i64)
            .map(Timestamp::from_micros)
    }

    /// Deserialize the fields into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|source| {
            StoreError::Decode {
                path: self.path.to_string(),
                source,
            }
        })
    }
}

/// A single field in a [`Write`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's clock when the write is applied.
    ServerTimestamp,
}

/// A set of fields to write.  Applied either as a merge (fields not named
/// here are left alone) or as a full replacement, depending on the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Write {
    fields: BTreeMap<String, FieldValue>,
}

impl Write {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), FieldValue::Value(value.into()));
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::ServerTimestamp);
        self
    }

    /// Every top-level field of a serializable struct.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::Value(v)))
                    .collect(),
            }),
            other => Err(StoreError::InvalidWrite(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve sentinels against `now`.
    pub(crate) fn resolve(&self, now: Timestamp) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    FieldValue::Value(v) => v.clone(),
                    FieldValue::ServerTimestamp => Value::from(now),
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// Merge into existing fields: named fields are overwritten, the rest
    /// kept.
    pub(crate) fn merge_into(&self, existing: &mut Map<String, Value>, now: Timestamp) {
        for (k, v) in self.resolve(now) {
            existing.insert(k, v);
        }
    }
}
