//! Selective settings merge.
//!
//! Each sync group carries its own "updated at" stamp, so unrelated edits on
//! two devices do not clobber each other. Groups the user has not opted into
//! stay local.

use serde_json::{Map, Value};

use crate::models::timestamp::optional_timestamp_ms;
use crate::models::{
    Settings, SettingsGroup, SyncPreferences, SyncPreferencesUpdatedAt, AI_API_KEY_FIELD,
    AI_OFFLINE_MODEL_PATH_FIELD,
};

/// Merge the synced groups of `incoming` into `local`.
///
/// Everything outside the groups, including the `lastSync*` bookkeeping,
/// comes from `local`.
pub fn merge_settings(local: &Settings, incoming: &Settings) -> Settings {
    let incoming = strip_device_fields(incoming);
    let mut merged = local.clone();
    let mut stamps = local.sync_preferences_updated_at.clone().unwrap_or_default();

    let prefs_newer = is_newer(local, &incoming, SettingsGroup::Preferences);
    merged.sync_preferences = merge_flags(
        local.sync_preferences.as_ref(),
        incoming.sync_preferences.as_ref(),
        prefs_newer,
    );
    adopt_stamp(&mut stamps, &incoming, SettingsGroup::Preferences, prefs_newer);

    let flags = merged.sync_preferences.unwrap_or_default();
    for group in SettingsGroup::SYNCABLE {
        if !flags.is_enabled(group) {
            continue;
        }
        let newer = is_newer(local, &incoming, group);
        merge_group(&mut merged, local, &incoming, group, newer);
        adopt_stamp(&mut stamps, &incoming, group, newer);
    }

    restore_device_fields(&mut merged, local);
    merged.sync_preferences_updated_at =
        (stamps != SyncPreferencesUpdatedAt::default()).then_some(stamps);
    merged
}

/// Strictly later stamp on the incoming side. Ties keep local.
fn is_newer(local: &Settings, incoming: &Settings, group: SettingsGroup) -> bool {
    optional_timestamp_ms(incoming.group_updated_at(group))
        > optional_timestamp_ms(local.group_updated_at(group))
}

fn adopt_stamp(
    stamps: &mut SyncPreferencesUpdatedAt,
    incoming: &Settings,
    group: SettingsGroup,
    newer: bool,
) {
    if newer {
        stamps.set(group, incoming.group_updated_at(group).map(str::to_string));
    }
}

fn merge_group(
    merged: &mut Settings,
    local: &Settings,
    incoming: &Settings,
    group: SettingsGroup,
    newer: bool,
) {
    match group {
        SettingsGroup::Preferences => {}
        SettingsGroup::Appearance => {
            merged.theme = pick(&local.theme, &incoming.theme, newer);
            merged.appearance = merge_object(&local.appearance, &incoming.appearance, newer);
        }
        SettingsGroup::Language => {
            merged.language = pick(&local.language, &incoming.language, newer);
            merged.week_start = pick(&local.week_start, &incoming.week_start, newer);
            merged.date_format = pick(&local.date_format, &incoming.date_format, newer);
        }
        SettingsGroup::ExternalCalendars => {
            merged.external_calendars =
                pick(&local.external_calendars, &incoming.external_calendars, newer);
        }
        SettingsGroup::Ai => {
            merged.ai = merge_object(&local.ai, &incoming.ai, newer);
        }
    }
}

fn merge_flags(
    local: Option<&SyncPreferences>,
    incoming: Option<&SyncPreferences>,
    newer: bool,
) -> Option<SyncPreferences> {
    match (local, incoming) {
        (None, None) => None,
        (Some(one), None) | (None, Some(one)) => Some(*one),
        (Some(local), Some(incoming)) => Some(SyncPreferences {
            appearance: pick(&local.appearance, &incoming.appearance, newer),
            language: pick(&local.language, &incoming.language, newer),
            external_calendars: pick(
                &local.external_calendars,
                &incoming.external_calendars,
                newer,
            ),
            ai: pick(&local.ai, &incoming.ai, newer),
        }),
    }
}

/// One-sided values survive; on disagreement the newer side wins.
fn pick<T: Clone>(local: &Option<T>, incoming: &Option<T>, incoming_newer: bool) -> Option<T> {
    match (local, incoming) {
        (Some(local), Some(incoming)) => Some(if incoming_newer {
            incoming.clone()
        } else {
            local.clone()
        }),
        (Some(one), None) | (None, Some(one)) => Some(one.clone()),
        (None, None) => None,
    }
}

fn merge_object(
    local: &Option<Map<String, Value>>,
    incoming: &Option<Map<String, Value>>,
    incoming_newer: bool,
) -> Option<Map<String, Value>> {
    let (Some(local), Some(incoming)) = (local, incoming) else {
        return pick(local, incoming, incoming_newer);
    };
    let (mut base, overlay) = if incoming_newer {
        (local.clone(), incoming)
    } else {
        (incoming.clone(), local)
    };
    base.extend(overlay.iter().map(|(key, value)| (key.clone(), value.clone())));
    Some(base)
}

fn strip_device_fields(settings: &Settings) -> Settings {
    let mut settings = settings.clone();
    if let Some(ai) = settings.ai.as_mut() {
        ai.remove(AI_API_KEY_FIELD);
        ai.remove(AI_OFFLINE_MODEL_PATH_FIELD);
    }
    settings
}

fn restore_device_fields(merged: &mut Settings, local: &Settings) {
    let local_ai = local.ai.as_ref();
    let Some(ai) = merged.ai.as_mut() else {
        return;
    };
    for field in [AI_API_KEY_FIELD, AI_OFFLINE_MODEL_PATH_FIELD] {
        match local_ai.and_then(|local| local.get(field)) {
            Some(value) => {
                ai.insert(field.to_string(), value.clone());
            }
            None => {
                ai.remove(field);
            }
        }
    }
}
