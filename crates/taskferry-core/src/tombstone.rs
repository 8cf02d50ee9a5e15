//! Tombstone lifecycle: creation, purge scheduling and physical removal.
//!
//! Deletes are soft. A deleted record keeps travelling between replicas
//! until a sweep stamps it with `purgedAt`; only after the retention window
//! has elapsed past that stamp is the record dropped for good.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::timestamp::{format_timestamp, parse_timestamp};
use crate::models::{AppData, Attachment, DeviceId, Entity, SyncMeta};

pub const DEFAULT_RETENTION_DAYS: i64 = 90;
pub const MIN_RETENTION_DAYS: i64 = 1;
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// What a purge removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed_tasks: usize,
    pub removed_attachments: usize,
}

impl PurgeReport {
    pub const fn is_empty(&self) -> bool {
        self.removed_tasks == 0 && self.removed_attachments == 0
    }
}

impl std::ops::AddAssign for PurgeReport {
    fn add_assign(&mut self, other: Self) {
        self.removed_tasks += other.removed_tasks;
        self.removed_attachments += other.removed_attachments;
    }
}

/// Clamp a configured retention to the supported range.
pub fn clamp_retention_days(days: i64) -> i64 {
    days.clamp(MIN_RETENTION_DAYS, MAX_RETENTION_DAYS)
}

/// Physically drop expired tombstones from `data`.
///
/// A task goes only when it is deleted and its `purgedAt` lies at least
/// `retention_days` in the past. Attachment tombstones inside surviving
/// tasks and projects expire on their own `deletedAt`.
pub fn purge_expired_tombstones(
    data: &mut AppData,
    now: DateTime<Utc>,
    retention_days: i64,
) -> PurgeReport {
    let cutoff = now - Duration::days(clamp_retention_days(retention_days));
    let mut report = PurgeReport::default();

    let before = data.tasks.len();
    data.tasks.retain(|task| !task_expired(task, cutoff));
    report.removed_tasks = before - data.tasks.len();

    for entity in data.tasks.iter_mut().chain(data.projects.iter_mut()) {
        report.removed_attachments += prune_attachments(&mut entity.attachments, cutoff);
    }

    if !report.is_empty() {
        debug!(
            removed_tasks = report.removed_tasks,
            removed_attachments = report.removed_attachments,
            "purged expired tombstones"
        );
    }
    report
}

fn task_expired(task: &Entity, cutoff: DateTime<Utc>) -> bool {
    task.meta.is_deleted() && expired(task.purged_at.as_deref(), cutoff)
}

fn prune_attachments(attachments: &mut Vec<Attachment>, cutoff: DateTime<Utc>) -> usize {
    let before = attachments.len();
    attachments.retain(|attachment| !expired(attachment.meta.deleted_at.as_deref(), cutoff));
    before - attachments.len()
}

/// Unparsable stamps never expire.
fn expired(stamp: Option<&str>, cutoff: DateTime<Utc>) -> bool {
    stamp
        .and_then(parse_timestamp)
        .is_some_and(|stamp| stamp <= cutoff)
}

/// Turn a live record into a tombstone.
pub fn mark_deleted(meta: &mut SyncMeta, now: DateTime<Utc>, device: &DeviceId) {
    meta.touch(now, device);
    meta.deleted_at = Some(meta.updated_at.clone());
}

/// Stamp `purgedAt` on tasks deleted more than `after_days` ago.
///
/// The stamp is a regular edit so it propagates to the other replica before
/// either side drops the record. Returns how many tasks were scheduled.
pub fn schedule_purge(
    data: &mut AppData,
    now: DateTime<Utc>,
    after_days: i64,
    device: &DeviceId,
) -> usize {
    let cutoff = now - Duration::days(after_days.max(0));
    let mut scheduled = 0;
    for task in &mut data.tasks {
        if task.purged_at.is_some() || !expired(task.meta.deleted_at.as_deref(), cutoff) {
            continue;
        }
        task.meta.touch(now, device);
        task.purged_at = Some(format_timestamp(now));
        scheduled += 1;
    }
    scheduled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn at(value: &str) -> DateTime<Utc> {
        parse_timestamp(value).unwrap()
    }

    fn data(value: serde_json::Value) -> AppData {
        serde_json::from_value(value).unwrap()
    }

    fn purged_task() -> AppData {
        data(json!({
            "tasks": [{
                "id": "t1",
                "updatedAt": "2025-06-01",
                "deletedAt": "2025-06-01",
                "purgedAt": "2025-06-01"
            }]
        }))
    }

    #[test]
    fn expired_tombstone_is_removed() {
        let mut snapshot = purged_task();
        let report =
            purge_expired_tombstones(&mut snapshot, at("2026-01-01"), DEFAULT_RETENTION_DAYS);
        assert_eq!(report.removed_tasks, 1);
        assert!(snapshot.tasks.is_empty());
    }

    #[test]
    fn tombstone_inside_retention_is_kept() {
        let mut snapshot = purged_task();
        let report = purge_expired_tombstones(&mut snapshot, at("2026-01-02"), 220);
        assert!(report.is_empty());
        assert_eq!(snapshot.tasks.len(), 1);
    }

    #[test]
    fn unscheduled_tombstones_are_kept_forever() {
        let mut snapshot = data(json!({
            "tasks": [{"id": "t1", "updatedAt": "2000-01-01", "deletedAt": "2000-01-01"}]
        }));
        purge_expired_tombstones(&mut snapshot, at("2026-01-01"), 1);
        assert_eq!(snapshot.tasks.len(), 1);
    }

    #[test]
    fn live_tasks_with_purge_stamp_survive() {
        let mut snapshot = data(json!({
            "tasks": [{"id": "t1", "updatedAt": "2020-01-01", "purgedAt": "2020-01-01"}]
        }));
        purge_expired_tombstones(&mut snapshot, at("2026-01-01"), 1);
        assert_eq!(snapshot.tasks.len(), 1);
    }

    #[test]
    fn attachment_tombstones_expire_on_their_own() {
        let mut snapshot = data(json!({
            "projects": [{
                "id": "p1",
                "updatedAt": "2025-12-01",
                "attachments": [
                    {"id": "a1", "kind": "file", "updatedAt": "2025-01-01", "deletedAt": "2025-01-01"},
                    {"id": "a2", "kind": "file", "updatedAt": "2025-12-01", "deletedAt": "2025-12-01"},
                    {"id": "a3", "kind": "link", "updatedAt": "2025-01-01"}
                ]
            }]
        }));

        let report = purge_expired_tombstones(&mut snapshot, at("2026-01-01"), 90);

        assert_eq!(report.removed_attachments, 1);
        let ids: Vec<&str> = snapshot.projects[0]
            .attachments
            .iter()
            .map(|attachment| attachment.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a2", "a3"]);
    }

    #[test]
    fn retention_is_clamped() {
        assert_eq!(clamp_retention_days(0), 1);
        assert_eq!(clamp_retention_days(-5), 1);
        assert_eq!(clamp_retention_days(10_000), 3650);
        assert_eq!(clamp_retention_days(30), 30);
    }

    #[test]
    fn mark_deleted_bumps_revision() {
        let device = DeviceId::new();
        let mut task = Entity::new("t1", at("2024-01-01"));
        mark_deleted(&mut task.meta, at("2024-02-01T10:00:00Z"), &device);

        assert_eq!(task.meta.deleted_at.as_deref(), Some("2024-02-01T10:00:00.000Z"));
        assert_eq!(task.meta.updated_at, "2024-02-01T10:00:00.000Z");
        assert_eq!(task.meta.rev(), 1);
        assert_eq!(task.meta.rev_by(), device.as_str());
    }

    #[test]
    fn schedule_purge_stamps_old_tombstones_once() {
        let device = DeviceId::new();
        let mut snapshot = data(json!({
            "tasks": [
                {"id": "old", "updatedAt": "2025-01-01", "deletedAt": "2025-01-01"},
                {"id": "fresh", "updatedAt": "2025-12-30", "deletedAt": "2025-12-30"},
                {"id": "live", "updatedAt": "2020-01-01"}
            ]
        }));
        let now = at("2026-01-01");

        assert_eq!(schedule_purge(&mut snapshot, now, 30, &device), 1);
        assert_eq!(schedule_purge(&mut snapshot, now, 30, &device), 0);

        let old = &snapshot.tasks[0];
        assert_eq!(old.purged_at.as_deref(), Some("2026-01-01T00:00:00.000Z"));
        assert_eq!(old.meta.rev(), 1);
        assert!(snapshot.tasks[1].purged_at.is_none());
        assert!(snapshot.tasks[2].purged_at.is_none());
    }
}
