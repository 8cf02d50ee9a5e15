//! Attachment sub-merge.
//!
//! Attachments go through the same resolution as their parent entities.
//! For file attachments the device-local fields are then reconciled so a
//! remote version can never orphan a file that exists on this device.

use crate::models::{Attachment, EntityMergeStats, LocalStatus};

use super::{merge_with, pick, Side};

/// Merge two attachment lists of the same task or project.
pub fn merge_attachments(
    local: &[Attachment],
    incoming: &[Attachment],
) -> (Vec<Attachment>, EntityMergeStats) {
    merge_with(local, incoming, reconcile)
}

fn reconcile(local: &Attachment, incoming: &Attachment, winner: Side) -> Attachment {
    let mut merged = pick(local, incoming, winner).clone();
    if !merged.is_file() {
        return merged;
    }

    let local_copy = [local, incoming]
        .into_iter()
        .find(|candidate| candidate.has_local_copy());
    if let Some(source) = local_copy {
        merged.uri.clone_from(&source.uri);
        merged.local_status = Some(source.local_status.unwrap_or(LocalStatus::Available));
    }

    merged.cloud_key = local.cloud_key.clone().or_else(|| incoming.cloud_key.clone());
    merged.file_hash = local.file_hash.clone().or_else(|| incoming.file_hash.clone());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncRecord;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attachment(value: serde_json::Value) -> Attachment {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn keeps_local_file_and_adopts_remote_cloud_key() {
        let local = attachment(json!({
            "id": "a1",
            "kind": "file",
            "uri": "/home/me/files/a1.pdf",
            "localStatus": "available",
            "updatedAt": "2024-01-01T00:00:00Z"
        }));
        let incoming = attachment(json!({
            "id": "a1",
            "kind": "file",
            "uri": "",
            "cloudKey": "attachments/a1.pdf",
            "fileHash": "abc",
            "updatedAt": "2024-01-02T00:00:00Z"
        }));

        let (merged, stats) = merge_attachments(&[local], &[incoming]);

        assert_eq!(stats.resolved_using_incoming, 1);
        assert_eq!(merged[0].uri, "/home/me/files/a1.pdf");
        assert_eq!(merged[0].local_status, Some(LocalStatus::Available));
        assert_eq!(merged[0].cloud_key.as_deref(), Some("attachments/a1.pdf"));
        assert_eq!(merged[0].file_hash.as_deref(), Some("abc"));
        assert_eq!(merged[0].meta().updated_at, "2024-01-02T00:00:00Z");
    }

    #[test]
    fn local_cloud_key_wins_ties() {
        let local = attachment(json!({
            "id": "a1", "kind": "file", "uri": "/x.png",
            "cloudKey": "attachments/local.png", "updatedAt": "2024-01-01"
        }));
        let incoming = attachment(json!({
            "id": "a1", "kind": "file", "uri": "/y.png",
            "cloudKey": "attachments/remote.png", "updatedAt": "2024-01-02"
        }));

        let (merged, _) = merge_attachments(&[local], &[incoming]);

        assert_eq!(merged[0].cloud_key.as_deref(), Some("attachments/local.png"));
        assert_eq!(merged[0].uri, "/x.png");
    }

    #[test]
    fn missing_local_file_falls_back_to_incoming_copy() {
        let local = attachment(json!({
            "id": "a1", "kind": "file", "uri": "/gone.png",
            "localStatus": "missing", "updatedAt": "2024-01-02"
        }));
        let incoming = attachment(json!({
            "id": "a1", "kind": "file", "uri": "/other.png",
            "localStatus": "available", "updatedAt": "2024-01-01"
        }));

        let (merged, _) = merge_attachments(&[local], &[incoming]);

        assert_eq!(merged[0].uri, "/other.png");
        assert_eq!(merged[0].local_status, Some(LocalStatus::Available));
    }

    #[test]
    fn links_are_taken_from_the_winner_as_is() {
        let local = attachment(json!({
            "id": "l1", "kind": "link", "uri": "https://a.example", "updatedAt": "2024-01-01"
        }));
        let incoming = attachment(json!({
            "id": "l1", "kind": "link", "uri": "https://b.example", "updatedAt": "2024-01-02"
        }));

        let (merged, _) = merge_attachments(&[local], &[incoming]);

        assert_eq!(merged[0].uri, "https://b.example");
    }
}
