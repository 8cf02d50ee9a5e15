//! `LocalStore` backed by a single JSON data file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{empty_snapshot, read_json_or_backup, write_json_atomic, LocalStore};
use crate::models::AppData;
use crate::Result;

const READ_ATTEMPTS: u32 = 2;

/// Stores the snapshot in `data.json` with atomic replace and a backup copy.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn load(&self) -> Result<Value> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(empty_snapshot());
        }
        read_json_or_backup(&self.path, READ_ATTEMPTS).await
    }

    async fn save(&self, data: &AppData) -> Result<()> {
        write_json_atomic(&self.path, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn missing_file_loads_as_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data.json"));

        assert_eq!(store.load().await.unwrap(), empty_snapshot());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("data.json"));
        let data = AppData {
            tasks: vec![Entity::new("t1", Utc::now()).with_field("title", "Buy milk")],
            ..AppData::default()
        };

        store.save(&data).await.unwrap();
        let loaded: AppData = serde_json::from_value(store.load().await.unwrap()).unwrap();

        assert_eq!(loaded, data);
    }
}
