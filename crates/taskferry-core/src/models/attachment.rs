//! Attachment model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::{canonical_json, SyncMeta, SyncRecord};

/// What an attachment points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Bytes that live on disk and travel through the remote backend
    File,
    /// A URL; never transferred
    Link,
}

/// Device-local availability of a file attachment.
///
/// Never meaningfully compared across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalStatus {
    Available,
    Missing,
    Uploading,
    Downloading,
}

/// Attachment metadata nested inside a task or project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub kind: AttachmentKind,
    /// Local path for files, URL for links.
    #[serde(default)]
    pub uri: String,
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Remote storage path. Absent until the file has been uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_key: Option<String>,
    /// Lowercase SHA-256 hex digest of the file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_status: Option<LocalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Attachment {
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, AttachmentKind::File)
    }

    /// Whether this replica claims a usable local copy.
    pub fn has_local_copy(&self) -> bool {
        !self.uri.trim().is_empty() && self.local_status != Some(LocalStatus::Missing)
    }

    /// File attachments whose uri is a plain local path.
    pub fn is_transferable(&self) -> bool {
        self.is_file() && !self.meta.is_deleted() && !is_remote_uri(&self.uri)
    }

    /// File extension taken from the uri, falling back to the title field.
    pub fn extension(&self) -> Option<String> {
        let candidate = if self.uri.trim().is_empty() {
            self.fields.get("title").and_then(Value::as_str).unwrap_or("")
        } else {
            self.uri.as_str()
        };
        let file_name = candidate.rsplit(|ch| ch == '/' || ch == '\\').next().unwrap_or("");
        let (stem, ext) = file_name.rsplit_once('.')?;
        let ext = ext.trim();
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl SyncRecord for Attachment {
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
        let Ok(mut value) = serde_json::to_value(self) else {
            return String::new();
        };
        if let Some(object) = value.as_object_mut() {
            object.remove("localStatus");
            if self.is_file() {
                object.remove("uri");
            }
        }
        canonical_json(&value)
    }
}

fn is_remote_uri(uri: &str) -> bool {
    let uri = uri.trim_start().to_ascii_lowercase();
    uri.starts_with("http://") || uri.starts_with("https://")
}
