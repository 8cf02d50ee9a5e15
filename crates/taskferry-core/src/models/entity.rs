//! Entity model shared by tasks, projects, sections and areas

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::attachment::Attachment;
use super::timestamp::{format_timestamp, optional_timestamp_ms, timestamp_ms};

/// Identifier of the device that produced a revision, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Create a new unique device ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Timestamps and revision metadata every synced record carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: String,
    /// Presence marks the record as a tombstone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_by: Option<String>,
}

impl SyncMeta {
    /// Fresh metadata for a record created at `now`.
    pub fn created(now: DateTime<Utc>) -> Self {
        let now = format_timestamp(now);
        Self {
            created_at: Some(now.clone()),
            updated_at: now,
            deleted_at: None,
            rev: Some(0),
            rev_by: None,
        }
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn rev(&self) -> i64 {
        self.rev.unwrap_or(0)
    }

    pub fn rev_by(&self) -> &str {
        self.rev_by.as_deref().unwrap_or("")
    }

    /// Whether this side carries usable revision metadata.
    pub fn has_revision(&self) -> bool {
        self.rev() > 0 || !self.rev_by().is_empty()
    }

    pub fn updated_ms(&self) -> i64 {
        timestamp_ms(&self.updated_at)
    }

    /// Time of the last operation: for tombstones the later of the edit and
    /// the deletion, otherwise the last edit.
    pub fn operation_ms(&self) -> i64 {
        let updated = self.updated_ms();
        if self.is_deleted() {
            updated.max(optional_timestamp_ms(self.deleted_at.as_deref()))
        } else {
            updated
        }
    }

    /// Record a local edit: bump the revision and stamp the editing device.
    pub fn touch(&mut self, now: DateTime<Utc>, device: &DeviceId) {
        self.updated_at = format_timestamp(now);
        self.rev = Some(self.rev().saturating_add(1));
        self.rev_by = Some(device.as_str());
    }
}

/// Anything the merge engine can reconcile.
pub trait SyncRecord: Clone {
    fn id(&self) -> &str;

    fn meta(&self) -> &SyncMeta;

    fn meta_mut(&mut self) -> &mut SyncMeta;

    /// Deterministic serialized form used to break full metadata ties.
    fn content_signature(&self) -> String;
}

/// A task, project, section or area.
///
/// Only the fields the sync engine reasons about are typed; everything else
/// the apps store is carried verbatim in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Set on tombstones that are scheduled for physical removal. Tasks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purged_at: Option<String>,
    /// Tasks and projects only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub type Task = Entity;
pub type Project = Entity;
pub type Section = Entity;
pub type Area = Entity;

impl Entity {
    /// Create a new live entity with `rev = 0`.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            meta: SyncMeta::created(now),
            purged_at: None,
            attachments: Vec::new(),
            fields: Map::new(),
        }
    }

    /// Set an opaque content field, builder style.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

impl SyncRecord for Entity {
    fn id(&self) -> &str {
        &self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn content_signature(&self) -> String {
        serde_json::to_value(self).map_or_else(|_| String::new(), |value| canonical_json(&value))
    }
}

/// Serialize a JSON value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
