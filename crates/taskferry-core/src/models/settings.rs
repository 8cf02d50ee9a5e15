//! Application settings model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::stats::{MergeStats, SyncHistoryEntry, SyncStatus};

/// AI provider secret. Never leaves the device.
pub const AI_API_KEY_FIELD: &str = "apiKey";
/// Path of a locally downloaded model. Device-local state.
pub const AI_OFFLINE_MODEL_PATH_FIELD: &str = "offlineModelPath";

/// A subscribed ICS calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCalendarSubscription {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Which settings groups follow the remote replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_calendars: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<bool>,
}

/// Last edit time of each settings group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPreferencesUpdatedAt {
    /// The sync flags themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_calendars: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<String>,
}

/// Settings groups that merge independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsGroup {
    Preferences,
    Appearance,
    Language,
    ExternalCalendars,
    Ai,
}

impl SettingsGroup {
    pub const SYNCABLE: [Self; 4] = [
        Self::Appearance,
        Self::Language,
        Self::ExternalCalendars,
        Self::Ai,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Preferences => "preferences",
            Self::Appearance => "appearance",
            Self::Language => "language",
            Self::ExternalCalendars => "externalCalendars",
            Self::Ai => "ai",
        }
    }
}

impl SyncPreferences {
    /// Whether `group` is enabled for sync. The umbrella group always is.
    pub fn is_enabled(&self, group: SettingsGroup) -> bool {
        let flag = match group {
            SettingsGroup::Preferences => return true,
            SettingsGroup::Appearance => self.appearance,
            SettingsGroup::Language => self.language,
            SettingsGroup::ExternalCalendars => self.external_calendars,
            SettingsGroup::Ai => self.ai,
        };
        flag == Some(true)
    }
}

impl SyncPreferencesUpdatedAt {
    pub fn get(&self, group: SettingsGroup) -> Option<&str> {
        match group {
            SettingsGroup::Preferences => self.preferences.as_deref(),
            SettingsGroup::Appearance => self.appearance.as_deref(),
            SettingsGroup::Language => self.language.as_deref(),
            SettingsGroup::ExternalCalendars => self.external_calendars.as_deref(),
            SettingsGroup::Ai => self.ai.as_deref(),
        }
    }

    pub fn set(&mut self, group: SettingsGroup, value: Option<String>) {
        let slot = match group {
            SettingsGroup::Preferences => &mut self.preferences,
            SettingsGroup::Appearance => &mut self.appearance,
            SettingsGroup::Language => &mut self.language,
            SettingsGroup::ExternalCalendars => &mut self.external_calendars,
            SettingsGroup::Ai => &mut self.ai,
        };
        *slot = value;
    }
}

/// Application settings
///
/// Keys outside the sync groups and the `lastSync*` bookkeeping are carried
/// in `fields` and treated as device-local.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_calendars: Option<Vec<ExternalCalendarSubscription>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_preferences: Option<SyncPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_preferences_updated_at: Option<SyncPreferencesUpdatedAt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_status: Option<SyncStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_stats: Option<MergeStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_sync_history: Vec<SyncHistoryEntry>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Settings {
    pub fn group_updated_at(&self, group: SettingsGroup) -> Option<&str> {
        self.sync_preferences_updated_at
            .as_ref()
            .and_then(|stamps| stamps.get(group))
    }

    /// Copy suitable for the remote replica: secrets and device-local AI
    /// state removed.
    #[must_use]
    pub fn for_remote(&self) -> Self {
        let mut settings = self.clone();
        if let Some(ai) = settings.ai.as_mut() {
            ai.remove(AI_API_KEY_FIELD);
            ai.remove(AI_OFFLINE_MODEL_PATH_FIELD);
        }
        settings
    }
}
