//! Crash-tolerant JSON files.
//!
//! Writes go to a sibling `.tmp` file that is fsynced and renamed over the
//! target, keeping the previous copy as `.bak`. Reads tolerate files that a
//! folder-sync tool is still replacing: BOMs and trailing NULs are stripped,
//! anything after the first JSON value is ignored, and failed reads are
//! retried with a short backoff before falling back to the backup.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::{Error, Result};

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(suffix);
    path.with_file_name(name)
}

pub(crate) fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

/// Atomically replace `path` with `bytes`, keeping a `.bak` of the old copy.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        if let Err(error) = tokio::fs::copy(path, backup_path(path)).await {
            warn!(path = %path.display(), %error, "could not refresh backup copy");
        }
    }

    let tmp_path = sibling(path, ".tmp");
    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }

    if cfg!(windows) && tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_file(path).await?;
    }
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content).await
}

fn sanitize_json_text(raw: &str) -> &str {
    raw.trim_start_matches('\u{FEFF}')
        .trim_end()
        .trim_end_matches('\u{0}')
        .trim_end()
}

/// Parse the first JSON value in `raw`. Empty input reads as `{}`.
pub(crate) fn parse_json_relaxed(raw: &str) -> Result<Value> {
    let text = sanitize_json_text(raw);
    if text.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let start = text.find(|ch| ch == '{' || ch == '[').unwrap_or(0);
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()
        .unwrap_or_else(|| Ok(Value::Object(serde_json::Map::new())))
        .map_err(Error::from)
}

/// Read and parse `path`, retrying while another writer may be mid-replace.
pub(crate) async fn read_json_with_retries(path: &Path, attempts: u32) -> Result<Value> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 0..attempts {
        let outcome = match tokio::fs::read(path).await {
            Ok(bytes) => parse_json_relaxed(&String::from_utf8_lossy(&bytes)),
            Err(error) => Err(Error::from(error)),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(error) => last_error = Some(error),
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(Duration::from_millis(120 + u64::from(attempt) * 80)).await;
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Storage(format!("could not read {}", path.display()))))
}

/// Read `path`, falling back to its `.bak` copy when the primary is unreadable.
pub(crate) async fn read_json_or_backup(path: &Path, attempts: u32) -> Result<Value> {
    match read_json_with_retries(path, attempts).await {
        Ok(value) => Ok(value),
        Err(primary) => {
            let backup = backup_path(path);
            if tokio::fs::try_exists(&backup).await.unwrap_or(false) {
                if let Ok(value) = read_json_with_retries(&backup, 2).await {
                    warn!(path = %path.display(), error = %primary, "recovered snapshot from backup");
                    return Ok(value);
                }
            }
            Err(primary)
        }
    }
}
