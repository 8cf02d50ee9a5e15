use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use taskferry_core::config::CONFIG_FILE_NAME;
use taskferry_core::models::timestamp::{optional_timestamp_ms, parse_timestamp};
use taskferry_core::models::{SyncHistoryEntry, SyncStatus};
use taskferry_core::validate::decode_snapshot;
use taskferry_core::{
    AppData, Backend, JsonFileStore, LocalStore, SyncConfig, SyncEngine, SystemClock,
};

use crate::error::CliError;

const APP_DIR: &str = "taskferry";
const DATA_FILE_NAME: &str = "data.json";

pub type CliEngine = SyncEngine<JsonFileStore, Backend>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusItem {
    pub data_path: String,
    pub last_sync_at: Option<String>,
    pub last_sync_status: Option<SyncStatus>,
    pub last_sync_error: Option<String>,
    pub history: Vec<SyncHistoryEntry>,
}

pub fn resolve_config_dir(cli_config_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_config_dir
        .or_else(|| env::var_os("TASKFERRY_CONFIG_DIR").map(PathBuf::from))
        .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR)))
        .ok_or_else(|| {
            CliError::Config("Failed to resolve config directory; pass --config-dir".to_string())
        })
}

/// `--data-path`, then `TASKFERRY_DATA_PATH`, then config.toml, then the
/// platform data directory.
pub fn resolve_data_path(
    cli_data_path: Option<PathBuf>,
    configured: Option<&Path>,
) -> Result<PathBuf, CliError> {
    cli_data_path
        .or_else(|| env::var_os("TASKFERRY_DATA_PATH").map(PathBuf::from))
        .or_else(|| configured.map(Path::to_path_buf))
        .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR).join(DATA_FILE_NAME)))
        .ok_or_else(|| {
            CliError::Config("Failed to resolve data directory; pass --data-path".to_string())
        })
}

/// `~/Sync/taskferry`, the folder most sync clients already watch.
pub fn default_sync_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Sync").join(APP_DIR))
}

/// Attachments without a local path are downloaded next to the data file.
pub fn download_dir(data_path: &Path) -> PathBuf {
    data_path
        .parent()
        .map_or_else(|| PathBuf::from("attachments"), |dir| dir.join("attachments"))
}

pub fn load_sync_config(config_dir: &Path) -> Result<SyncConfig, CliError> {
    if !config_dir.join(CONFIG_FILE_NAME).exists() {
        return Err(CliError::SyncNotConfigured);
    }
    Ok(SyncConfig::load(config_dir)?)
}

pub fn open_engine(config: &SyncConfig, data_path: &Path) -> Result<CliEngine, CliError> {
    let backend = Backend::from_config(&config.backend, config.engine.request_timeout())?;
    Ok(SyncEngine::new(
        JsonFileStore::new(data_path),
        backend,
        config.engine.clone(),
        download_dir(data_path),
        Arc::new(SystemClock),
    ))
}

pub async fn load_local_data(data_path: &Path) -> Result<AppData, CliError> {
    let value = JsonFileStore::new(data_path).load().await?;
    Ok(decode_snapshot(value, "local")?)
}

pub fn status_item(data: &AppData, data_path: &Path, limit: usize) -> StatusItem {
    let settings = &data.settings;
    StatusItem {
        data_path: data_path.display().to_string(),
        last_sync_at: settings.last_sync_at.clone(),
        last_sync_status: settings.last_sync_status,
        last_sync_error: settings.last_sync_error.clone(),
        history: recent_history(&settings.last_sync_history, limit),
    }
}

/// Newest first.
pub fn recent_history(history: &[SyncHistoryEntry], limit: usize) -> Vec<SyncHistoryEntry> {
    history.iter().rev().take(limit).cloned().collect()
}

pub fn format_history_lines(entries: &[SyncHistoryEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let when = format_sync_time(&entry.at);
            let relative = format_relative_time(optional_timestamp_ms(Some(&entry.at)), now_ms);
            let detail = match entry.status {
                SyncStatus::Error => entry.error.clone().unwrap_or_default(),
                SyncStatus::Success | SyncStatus::Conflict => {
                    format_conflict_count(entry.conflicts)
                }
            };
            format!(
                "{when}  {relative:<8}  {:<8}  {detail}",
                status_label(entry.status)
            )
        })
        .collect()
}

pub const fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Success => "success",
        SyncStatus::Conflict => "conflict",
        SyncStatus::Error => "error",
    }
}

pub fn format_conflict_count(conflicts: usize) -> String {
    if conflicts == 1 {
        "1 conflict".to_string()
    } else {
        format!("{conflicts} conflicts")
    }
}

pub fn format_sync_time(at: &str) -> String {
    parse_timestamp(at).map_or_else(
        || at.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
