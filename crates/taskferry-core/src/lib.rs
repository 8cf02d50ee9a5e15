//! taskferry-core - Sync engine for taskferry
//!
//! Offline-first replication of a task manager's data between a device's
//! local store and a remote replica (a shared folder, a WebDAV server or a
//! cloud endpoint). Contains the merge rules, tombstone lifecycle, the sync
//! cycle and the attachment transfer protocol used by every interface.

pub mod attachments;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod storage;
pub mod sync;
pub mod tombstone;
pub mod validate;

pub use backend::{Backend, BackendKind, RemoteBackend};
pub use clock::{Clock, SystemClock};
pub use config::{BackendConfig, EngineConfig, SyncConfig};
pub use error::{Error, Result};
pub use models::{AppData, DeviceId, Entity, Settings, SyncStatus};
pub use storage::{JsonFileStore, LocalStore};
pub use sync::{LocalVersion, SyncCoordinator, SyncEngine, SyncOutcome, TriggerOutcome};
