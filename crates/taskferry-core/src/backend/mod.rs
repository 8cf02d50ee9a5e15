//! Remote replica backends.
//!
//! The sync engine only needs whole-snapshot JSON reads and writes plus a
//! small blob API for attachments. Three kinds exist: a plain directory
//! (usually kept in sync by a file-sync tool), a WebDAV server and the
//! custom cloud endpoint.

mod cloud;
mod file;
mod http;
mod webdav;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::models::AppData;
use crate::{Error, Result};

pub use cloud::CloudBackend;
pub use file::FileBackend;
pub use webdav::WebDavBackend;

/// Name of the snapshot document on file and WebDAV backends.
pub const DATA_FILE_NAME: &str = "data.json";

/// Which kind of remote a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    WebDav,
    Cloud,
}

impl BackendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::WebDav => "webdav",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "webdav" => Ok(Self::WebDav),
            "cloud" => Ok(Self::Cloud),
            other => Err(Error::Config(format!("unknown sync backend: {other}"))),
        }
    }
}

/// Operations the engine needs from a remote replica.
///
/// Attachment keys are slash-separated relative paths such as
/// `attachments/<id>.png`.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Read the remote snapshot. `None` when nothing has been written yet.
    async fn get_json(&self) -> Result<Option<Value>>;

    async fn put_json(&self, data: &AppData) -> Result<()>;

    async fn file_exists(&self, key: &str) -> Result<bool>;

    async fn get_file(&self, key: &str) -> Result<Vec<u8>>;

    async fn put_file(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()>;

    async fn delete_file(&self, key: &str) -> Result<()>;

    async fn make_directory(&self, path: &str) -> Result<()>;
}

/// A configured backend of any kind.
#[derive(Debug, Clone)]
pub enum Backend {
    File(FileBackend),
    WebDav(WebDavBackend),
    Cloud(CloudBackend),
}

impl Backend {
    /// Build the backend described by `config`. `timeout` applies to each
    /// HTTP request.
    pub fn from_config(config: &BackendConfig, timeout: Duration) -> Result<Self> {
        match config {
            BackendConfig::File { path } => Ok(Self::File(FileBackend::new(path.clone()))),
            BackendConfig::WebDav {
                url,
                username,
                password,
            } => Ok(Self::WebDav(WebDavBackend::new(
                url,
                username.clone(),
                password.clone(),
                timeout,
            )?)),
            BackendConfig::Cloud { url, token } => {
                Ok(Self::Cloud(CloudBackend::new(url, token.clone(), timeout)?))
            }
        }
    }
}

#[async_trait]
impl RemoteBackend for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Self::File(_) => BackendKind::File,
            Self::WebDav(_) => BackendKind::WebDav,
            Self::Cloud(_) => BackendKind::Cloud,
        }
    }

    async fn get_json(&self) -> Result<Option<Value>> {
        match self {
            Self::File(backend) => backend.get_json().await,
            Self::WebDav(backend) => backend.get_json().await,
            Self::Cloud(backend) => backend.get_json().await,
        }
    }

    async fn put_json(&self, data: &AppData) -> Result<()> {
        match self {
            Self::File(backend) => backend.put_json(data).await,
            Self::WebDav(backend) => backend.put_json(data).await,
            Self::Cloud(backend) => backend.put_json(data).await,
        }
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        match self {
            Self::File(backend) => backend.file_exists(key).await,
            Self::WebDav(backend) => backend.file_exists(key).await,
            Self::Cloud(backend) => backend.file_exists(key).await,
        }
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        match self {
            Self::File(backend) => backend.get_file(key).await,
            Self::WebDav(backend) => backend.get_file(key).await,
            Self::Cloud(backend) => backend.get_file(key).await,
        }
    }

    async fn put_file(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()> {
        match self {
            Self::File(backend) => backend.put_file(key, bytes, content_type).await,
            Self::WebDav(backend) => backend.put_file(key, bytes, content_type).await,
            Self::Cloud(backend) => backend.put_file(key, bytes, content_type).await,
        }
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        match self {
            Self::File(backend) => backend.delete_file(key).await,
            Self::WebDav(backend) => backend.delete_file(key).await,
            Self::Cloud(backend) => backend.delete_file(key).await,
        }
    }

    async fn make_directory(&self, path: &str) -> Result<()> {
        match self {
            Self::File(backend) => backend.make_directory(path).await,
            Self::WebDav(backend) => backend.make_directory(path).await,
            Self::Cloud(backend) => backend.make_directory(path).await,
        }
    }
}

/// Trim slashes and reject empty keys or `..` segments.
pub(crate) fn normalize_key(key: &str) -> Result<String> {
    let key = key.trim().trim_matches('/').to_string();
    if key.is_empty() {
        return Err(Error::InvalidInput("remote key cannot be empty".to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::InvalidInput(format!("invalid remote key: {key}")));
    }
    Ok(key)
}
