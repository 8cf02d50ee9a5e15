//! Sync configuration.
//!
//! Non-secret settings live in `config.toml`; credentials live in a separate
//! `secrets.toml` so the former can be shared or committed. Credentials can
//! also come from the environment, which wins over `secrets.toml`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attachments::{AttachmentConfig, BackoffConfig, RetryPolicy, ThrottleConfig};
use crate::backend::BackendKind;
use crate::models::{DeviceId, DEFAULT_HISTORY_LIMIT};
use crate::tombstone::DEFAULT_RETENTION_DAYS;
use crate::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SECRETS_FILE_NAME: &str = "secrets.toml";

const ENV_WEBDAV_PASSWORD: &str = "TASKFERRY_WEBDAV_PASSWORD";
const ENV_CLOUD_TOKEN: &str = "TASKFERRY_CLOUD_TOKEN";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Local data file. Defaults are chosen by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    /// `file`, `webdav` or `cloud`. Defaults to `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdav_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdav_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_url: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Contents of `secrets.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecretsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webdav_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_token: Option<String>,
}

/// Engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub tombstone_retention_days: i64,
    /// Age after which deleted tasks are stamped for purge.
    pub purge_after_days: i64,
    pub history_limit: usize,
    pub local_read_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub webdav: ThrottleConfig,
    pub backoff: BackoffConfig,
    pub attachments: AttachmentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tombstone_retention_days: DEFAULT_RETENTION_DAYS,
            purge_after_days: 30,
            history_limit: DEFAULT_HISTORY_LIMIT,
            local_read_timeout_secs: 10,
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
            webdav: ThrottleConfig::default(),
            backoff: BackoffConfig::default(),
            attachments: AttachmentConfig::default(),
        }
    }
}

impl EngineConfig {
    pub const fn local_read_timeout(&self) -> Duration {
        Duration::from_secs(self.local_read_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// A fully resolved remote backend.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendConfig {
    File {
        path: PathBuf,
    },
    WebDav {
        url: String,
        username: String,
        password: Option<String>,
    },
    Cloud {
        url: String,
        token: Option<String>,
    },
}

impl BackendConfig {
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::File { .. } => BackendKind::File,
            Self::WebDav { .. } => BackendKind::WebDav,
            Self::Cloud { .. } => BackendKind::Cloud,
        }
    }

    /// Human-readable target without credentials.
    pub fn target(&self) -> String {
        match self {
            Self::File { path } => path.display().to_string(),
            Self::WebDav { url, .. } | Self::Cloud { url, .. } => url.clone(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind())
            .field("target", &self.target())
            .finish_non_exhaustive()
    }
}

/// Everything needed to run a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub device_id: DeviceId,
    pub data_path: Option<PathBuf>,
    pub backend: BackendConfig,
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Load from `dir`, taking credential overrides from the process
    /// environment. A device id is generated and saved on first use.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::load_with(dir, |key| env::var(key).ok())
    }

    pub fn load_with(dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = read_config_file(&config_path)?;
        if normalize_text_option(config.device_id.clone()).is_none() {
            let device_id = DeviceId::new();
            info!(%device_id, path = %config_path.display(), "generated device id");
            config.device_id = Some(device_id.to_string());
            write_toml(&config_path, &config)?;
        }
        let secrets = read_secrets_file(&dir.join(SECRETS_FILE_NAME))?;
        Self::resolve(config, secrets, lookup)
    }

    /// Combine the two files and the environment into a usable config.
    pub fn resolve(
        config: ConfigFile,
        secrets: SecretsFile,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let device_id = normalize_required_value(config.device_id, "device_id")?
            .parse::<DeviceId>()
            .map_err(|error| Error::Config(format!("invalid device_id: {error}")))?;

        let kind = match normalize_text_option(config.sync_backend) {
            Some(raw) => raw.parse::<BackendKind>()?,
            None => BackendKind::File,
        };

        let backend = match kind {
            BackendKind::File => BackendConfig::File {
                path: config
                    .sync_path
                    .filter(|path| !path.as_os_str().is_empty())
                    .ok_or_else(|| {
                        Error::Config("sync_path is required for the file backend".to_string())
                    })?,
            },
            BackendKind::WebDav => BackendConfig::WebDav {
                url: normalize_required_http_url(config.webdav_url, "webdav_url")?,
                username: normalize_text_option(config.webdav_username).unwrap_or_default(),
                password: normalize_text_option(lookup(ENV_WEBDAV_PASSWORD))
                    .or(secrets.webdav_password),
            },
            BackendKind::Cloud => BackendConfig::Cloud {
                url: normalize_required_http_url(config.cloud_url, "cloud_url")?,
                token: normalize_text_option(lookup(ENV_CLOUD_TOKEN))
                    .or_else(|| normalize_text_option(secrets.cloud_token)),
            },
        };

        Ok(Self {
            device_id,
            data_path: config.data_path,
            backend,
            engine: config.engine,
        })
    }
}

/// Read `config.toml`. A missing file reads as the defaults.
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    read_toml(path)
}

/// Read `secrets.toml`. A missing file reads as empty.
pub fn read_secrets_file(path: &Path) -> Result<SecretsFile> {
    read_toml(path)
}

/// Write both files into `dir`. An empty secrets file is removed.
pub fn write_config_files(dir: &Path, config: &ConfigFile, secrets: &SecretsFile) -> Result<()> {
    write_toml(&dir.join(CONFIG_FILE_NAME), config)?;
    let secrets_path = dir.join(SECRETS_FILE_NAME);
    if *secrets == SecretsFile::default() {
        if secrets_path.exists() {
            std::fs::remove_file(&secrets_path)?;
        }
        return Ok(());
    }
    write_toml(&secrets_path, secrets)
}

/// Trim `value` and treat blank text as absent.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

fn read_toml<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display()))),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(error) => Err(Error::Io(error)),
    }
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = toml::to_string_pretty(value)
        .map_err(|error| Error::Config(format!("failed to serialize {}: {error}", path.display())))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn normalize_required_value(raw: Option<String>, field: &str) -> Result<String> {
    normalize_text_option(raw).ok_or_else(|| Error::Config(format!("config field '{field}' is required")))
}

fn normalize_required_http_url(raw: Option<String>, field: &str) -> Result<String> {
    let value = normalize_required_value(raw, field)?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "config field '{field}' must include http:// or https://"
        )))
    }
}
