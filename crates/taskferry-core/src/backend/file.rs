//! Directory backend.
//!
//! The remote replica is a folder, typically shared through a file-sync
//! tool, so reads must cope with files that are replaced underneath us.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{normalize_key, BackendKind, RemoteBackend, DATA_FILE_NAME};
use crate::models::AppData;
use crate::storage::{read_json_or_backup, sibling, write_json_atomic};
use crate::{Error, Result};

const READ_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self) -> PathBuf {
        self.root.join(DATA_FILE_NAME)
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let key = normalize_key(key)?;
        Ok(key
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl RemoteBackend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn get_json(&self) -> Result<Option<Value>> {
        let path = self.data_path();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        read_json_or_backup(&path, READ_ATTEMPTS).await.map(Some)
    }

    async fn put_json(&self, data: &AppData) -> Result<()> {
        write_json_atomic(&self.data_path(), data).await
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                Error::NotFound(format!("file {}", path.display()))
            } else {
                Error::Io(error)
            }
        })
    }

    async fn put_file(&self, key: &str, bytes: &[u8], _content_type: Option<&str>) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = sibling(&path, ".part");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Err(error) if error.kind() != ErrorKind::NotFound => Err(Error::Io(error)),
            _ => Ok(()),
        }
    }

    async fn make_directory(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)?).await?;
        Ok(())
    }
}
