//! Data models for taskferry

mod app_data;
mod attachment;
mod entity;
mod settings;
mod stats;
pub mod timestamp;

pub use app_data::AppData;
pub use attachment::{Attachment, AttachmentKind, LocalStatus};
pub use entity::{
    canonical_json, Area, DeviceId, Entity, Project, Section, SyncMeta, SyncRecord, Task,
};
pub use settings::{
    ExternalCalendarSubscription, Settings, SettingsGroup, SyncPreferences,
    SyncPreferencesUpdatedAt, AI_API_KEY_FIELD, AI_OFFLINE_MODEL_PATH_FIELD,
};
pub use stats::{
    push_history, EntityMergeStats, MergeStats, SyncHistoryEntry, SyncStatus,
    DEFAULT_HISTORY_LIMIT, HISTORY_CONFLICT_ID_LIMIT,
};
