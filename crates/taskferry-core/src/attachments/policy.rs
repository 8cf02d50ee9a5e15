//! Upload admission rules per backend.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::models::Attachment;
use crate::{Error, Result};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Upload limit for the HTTP backends. The file backend has none.
    pub max_file_size_mb: u64,
    /// Accepted MIME types; `type/*` wildcards allowed, empty accepts all.
    pub allowed_mime_types: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            allowed_mime_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPolicy {
    max_size_bytes: Option<u64>,
    allowed_mime_types: Vec<String>,
}

impl AttachmentPolicy {
    pub fn for_backend(kind: BackendKind, config: &AttachmentConfig) -> Self {
        let max_size_bytes = match kind {
            BackendKind::File => None,
            BackendKind::WebDav | BackendKind::Cloud => {
                Some(config.max_file_size_mb.saturating_mul(BYTES_PER_MB))
            }
        };
        Self {
            max_size_bytes,
            allowed_mime_types: config
                .allowed_mime_types
                .iter()
                .map(|mime| mime.trim().to_ascii_lowercase())
                .filter(|mime| !mime.is_empty())
                .collect(),
        }
    }

    /// Reject uploads the backend would not accept.
    pub fn check(&self, attachment_id: &str, size: u64, mime: &str) -> Result<()> {
        if let Some(limit) = self.max_size_bytes {
            if size > limit {
                return Err(Error::InvalidInput(format!(
                    "attachment {attachment_id} is {size} bytes, over the {limit} byte limit"
                )));
            }
        }
        if !self.mime_allowed(mime) {
            return Err(Error::InvalidInput(format!(
                "attachment {attachment_id} has unsupported type {mime}"
            )));
        }
        Ok(())
    }

    fn mime_allowed(&self, mime: &str) -> bool {
        if self.allowed_mime_types.is_empty() {
            return true;
        }
        let mime = mime.to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|allowed| {
            allowed.strip_suffix("/*").map_or_else(
                || *allowed == mime,
                |prefix| mime.split('/').next() == Some(prefix),
            )
        })
    }
}

/// The attachment's recorded MIME type, otherwise a guess from the path.
pub fn resolve_mime(attachment: &Attachment, path: &Path) -> String {
    attachment
        .mime_type
        .as_deref()
        .map(str::trim)
        .filter(|mime| !mime.is_empty())
        .map_or_else(
            || {
                mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            },
            ToString::to_string,
        )
}
