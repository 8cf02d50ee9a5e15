//! Local persistence of the application snapshot.

mod durable;
mod json_file;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::AppData;
use crate::Result;

pub use json_file::JsonFileStore;

pub(crate) use durable::{
    parse_json_relaxed, read_json_or_backup, sibling, write_atomic, write_json_atomic,
};

/// The host application's storage adapter.
///
/// `load` returns the raw snapshot so the sync cycle can shape-check it
/// before decoding.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn load(&self) -> Result<Value>;

    async fn save(&self, data: &AppData) -> Result<()>;

    /// Flush any debounced write so the next `load` sees it.
    async fn flush_pending(&self) -> Result<()> {
        Ok(())
    }
}

/// Snapshot used when nothing has been written yet.
pub fn empty_snapshot() -> Value {
    serde_json::json!({
        "tasks": [],
        "projects": [],
        "sections": [],
        "areas": [],
        "settings": {}
    })
}
