//! In-memory replicas that record every write for cycle tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};

use super::freshness::LocalVersion;
use crate::backend::{BackendKind, RemoteBackend};
use crate::models::AppData;
use crate::storage::{empty_snapshot, LocalStore};
use crate::{Error, Result};

pub type Journal = Arc<Mutex<Vec<&'static str>>>;

pub fn entries(journal: &Journal) -> Vec<&'static str> {
    journal.lock().unwrap().clone()
}

pub struct MemoryStore {
    pub value: Mutex<Value>,
    pub journal: Journal,
    pub saves: AtomicUsize,
    /// Bumps the version once the given number of saves has landed.
    pub bump_on_save: Option<(usize, Arc<LocalVersion>)>,
}

impl MemoryStore {
    pub fn new(value: Value, journal: Journal) -> Self {
        Self {
            value: Mutex::new(value),
            journal,
            saves: AtomicUsize::new(0),
            bump_on_save: None,
        }
    }

    pub fn data(&self) -> AppData {
        serde_json::from_value(self.value.lock().unwrap().clone()).unwrap()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn load(&self) -> Result<Value> {
        Ok(self.value.lock().unwrap().clone())
    }

    async fn save(&self, data: &AppData) -> Result<()> {
        self.journal.lock().unwrap().push("local.save");
        *self.value.lock().unwrap() = serde_json::to_value(data)?;
        let saves = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, version)) = &self.bump_on_save {
            if saves == *after {
                version.bump();
            }
        }
        Ok(())
    }

    async fn flush_pending(&self) -> Result<()> {
        self.journal.lock().unwrap().push("local.flush");
        Ok(())
    }
}

/// Makes `get_json` wait until the test releases it.
pub struct Gate {
    pub entered: Notify,
    pub release: Semaphore,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

#[derive(Default)]
pub struct MemoryRemote {
    pub value: Mutex<Option<Value>>,
    pub journal: Journal,
    pub reads: AtomicUsize,
    pub fail_put: bool,
    /// Simulates a local edit landing while the cycle is running.
    pub bump_on_read: Option<Arc<LocalVersion>>,
    pub gate: Option<Arc<Gate>>,
}

impl MemoryRemote {
    pub fn new(value: Option<Value>, journal: Journal) -> Self {
        Self {
            value: Mutex::new(value),
            journal,
            ..Self::default()
        }
    }

    pub fn data(&self) -> AppData {
        let value = self.value.lock().unwrap().clone().unwrap_or_else(empty_snapshot);
        serde_json::from_value(value).unwrap()
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemote {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn get_json(&self) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.acquire().await.unwrap().forget();
        }
        if let Some(version) = &self.bump_on_read {
            version.bump();
        }
        Ok(self.value.lock().unwrap().clone())
    }

    async fn put_json(&self, data: &AppData) -> Result<()> {
        if self.fail_put {
            return Err(Error::Network("connection reset".to_string()));
        }
        self.journal.lock().unwrap().push("remote.put_json");
        *self.value.lock().unwrap() = Some(serde_json::to_value(data)?);
        Ok(())
    }

    async fn file_exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        Err(Error::NotFound(key.to_string()))
    }

    async fn put_file(&self, _key: &str, _bytes: &[u8], _content_type: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn delete_file(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn make_directory(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}
