//! Fail-closed validation gates.
//!
//! Raw payloads are checked for shape before they are decoded, and the
//! merged snapshot is checked again before it is written anywhere. Any
//! failure is an [`Error::Validation`] and no replica is touched.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::timestamp::parse_timestamp;
use crate::models::{AppData, SyncMeta};

pub const COLLECTIONS: [&str; 4] = ["tasks", "projects", "sections", "areas"];

/// Check the shape of a raw snapshot read from `source`.
pub fn validate_snapshot_shape(value: &Value, source: &str) -> Result<()> {
    let Some(root) = value.as_object() else {
        return Err(invalid(source, "snapshot is not a JSON object"));
    };

    for collection in COLLECTIONS {
        let Some(items) = root.get(collection) else {
            continue;
        };
        let Some(items) = items.as_array() else {
            return Err(invalid(source, &format!("{collection} is not an array")));
        };
        for (index, item) in items.iter().enumerate() {
            let path = format!("{collection}[{index}]");
            check_record(item, &path, source)?;
            if let Some(attachments) = item.get("attachments") {
                check_attachments(attachments, &path, source)?;
            }
        }
    }

    match root.get("settings") {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(invalid(source, "settings is not an object")),
    }
}

/// Validate the shape of `value` and decode it.
pub fn decode_snapshot(value: Value, source: &str) -> Result<AppData> {
    validate_snapshot_shape(&value, source)?;
    serde_json::from_value(value).map_err(|error| invalid(source, &error.to_string()))
}

/// Second gate, run on the merged snapshot before any write.
pub fn validate_merged(data: &AppData) -> Result<()> {
    let collections = [
        ("tasks", &data.tasks),
        ("projects", &data.projects),
        ("sections", &data.sections),
        ("areas", &data.areas),
    ];
    for (collection, items) in collections {
        for (index, entity) in items.iter().enumerate() {
            let path = format!("{collection}[{index}]");
            check_id(&entity.id, &path)?;
            check_meta(&entity.meta, &path)?;
            if let Some(purged_at) = entity.purged_at.as_deref() {
                check_timestamp(purged_at, "purgedAt", &path)?;
            }
            for (position, attachment) in entity.attachments.iter().enumerate() {
                let path = format!("{path}.attachments[{position}]");
                check_id(&attachment.id, &path)?;
                check_meta(&attachment.meta, &path)?;
            }
        }
    }
    Ok(())
}

fn check_record(item: &Value, path: &str, source: &str) -> Result<()> {
    let Some(object) = item.as_object() else {
        return Err(invalid(source, &format!("{path} is not an object")));
    };
    match object.get("id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => Ok(()),
        _ => Err(invalid(source, &format!("{path} is missing an id"))),
    }
}

fn check_attachments(attachments: &Value, parent: &str, source: &str) -> Result<()> {
    let Some(attachments) = attachments.as_array() else {
        return Err(invalid(source, &format!("{parent}.attachments is not an array")));
    };
    for (index, attachment) in attachments.iter().enumerate() {
        check_record(attachment, &format!("{parent}.attachments[{index}]"), source)?;
    }
    Ok(())
}

fn check_id(id: &str, path: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(merged_invalid(path, "id is empty"));
    }
    Ok(())
}

fn check_meta(meta: &SyncMeta, path: &str) -> Result<()> {
    let updated = check_timestamp(&meta.updated_at, "updatedAt", path)?;
    if let Some(created_at) = meta.created_at.as_deref() {
        let created = check_timestamp(created_at, "createdAt", path)?;
        if created > updated {
            return Err(merged_invalid(path, "createdAt is after updatedAt"));
        }
    }
    if let Some(deleted_at) = meta.deleted_at.as_deref() {
        check_timestamp(deleted_at, "deletedAt", path)?;
    }
    if meta.rev.is_some_and(|rev| rev < 0) {
        return Err(merged_invalid(path, "rev is negative"));
    }
    if meta.rev_by.as_deref().is_some_and(|rev_by| rev_by.trim().is_empty()) {
        return Err(merged_invalid(path, "revBy is empty"));
    }
    Ok(())
}

fn check_timestamp(
    value: &str,
    field: &str,
    path: &str,
) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(value).ok_or_else(|| merged_invalid(path, &format!("{field} is not a timestamp")))
}

fn invalid(source: &str, detail: &str) -> Error {
    Error::Validation(format!("{source} snapshot: {detail}"))
}

fn merged_invalid(path: &str, detail: &str) -> Error {
    Error::Validation(format!("merged snapshot: {path} {detail}"))
}
