//! Pairwise last-writer-wins merge of replica snapshots.
//!
//! Records present on both sides are resolved by revision metadata when
//! either side carries it, by wall-clock timestamps otherwise. Every
//! decision is symmetric: merging `(a, b)` and `(b, a)` picks the same
//! winner, so two devices that exchange snapshots converge.

mod attachments;
mod settings;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::timestamp::parse_timestamp;
use crate::models::{AppData, Entity, EntityMergeStats, MergeStats, SyncMeta, SyncRecord};

pub use attachments::merge_attachments;
pub use settings::merge_settings;

/// Timestamps closer than this are treated as concurrent.
pub const CLOCK_SKEW_THRESHOLD_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Local,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolution {
    winner: Side,
    conflict: bool,
}

impl Resolution {
    const fn conflict(winner: Side) -> Self {
        Self {
            winner,
            conflict: true,
        }
    }
}

/// Merge two collections of tasks, projects, sections or areas.
pub fn merge_entities(local: &[Entity], incoming: &[Entity]) -> (Vec<Entity>, EntityMergeStats) {
    merge_with(local, incoming, |local_item, incoming_item, winner| {
        let mut merged = pick(local_item, incoming_item, winner).clone();
        if !local_item.attachments.is_empty() || !incoming_item.attachments.is_empty() {
            merged.attachments =
                merge_attachments(&local_item.attachments, &incoming_item.attachments).0;
        }
        merged
    })
}

/// Merge two full snapshots.
pub fn merge_app_data(local: &AppData, incoming: &AppData) -> (AppData, MergeStats) {
    let (tasks, task_stats) = merge_entities(&local.tasks, &incoming.tasks);
    let (projects, project_stats) = merge_entities(&local.projects, &incoming.projects);
    let (sections, section_stats) = merge_entities(&local.sections, &incoming.sections);
    let (areas, area_stats) = merge_entities(&local.areas, &incoming.areas);

    let mut fields = incoming.fields.clone();
    fields.extend(local.fields.clone());

    let merged = AppData {
        tasks,
        projects,
        sections,
        areas,
        settings: merge_settings(&local.settings, &incoming.settings),
        fields,
    };
    let stats = MergeStats {
        tasks: task_stats,
        projects: project_stats,
        sections: section_stats,
        areas: area_stats,
    };
    (merged, stats)
}

pub(crate) fn merge_with<T, F>(local: &[T], incoming: &[T], mut combine: F) -> (Vec<T>, EntityMergeStats)
where
    T: SyncRecord,
    F: FnMut(&T, &T, Side) -> T,
{
    let local_by_id = index_by_id(local);
    let incoming_by_id = index_by_id(incoming);

    let mut stats = EntityMergeStats {
        total_local: local_by_id.len(),
        total_incoming: incoming_by_id.len(),
        ..EntityMergeStats::default()
    };

    let mut seen = HashSet::new();
    let ordered_ids = local
        .iter()
        .chain(incoming.iter())
        .map(|item| item.id())
        .filter(|id| seen.insert(*id));

    let mut merged = Vec::with_capacity(local_by_id.len().max(incoming_by_id.len()));
    for id in ordered_ids {
        match (local_by_id.get(id), incoming_by_id.get(id)) {
            (Some(local_item), None) => {
                stats.local_only += 1;
                merged.push((*local_item).clone());
            }
            (None, Some(incoming_item)) => {
                stats.incoming_only += 1;
                merged.push((*incoming_item).clone());
            }
            (Some(local_item), Some(incoming_item)) => {
                let resolution = resolve(*local_item, *incoming_item);
                if resolution.conflict {
                    record_conflict(&mut stats, *local_item, *incoming_item, resolution.winner);
                }
                merged.push(combine(*local_item, *incoming_item, resolution.winner));
            }
            (None, None) => {}
        }
    }

    for item in &mut merged {
        if normalize_timestamps(item.meta_mut()) {
            stats.timestamp_adjustments += 1;
        }
    }
    stats.total_merged = merged.len();

    (merged, stats)
}

pub(crate) const fn pick<'a, T>(local: &'a T, incoming: &'a T, side: Side) -> &'a T {
    match side {
        Side::Local => local,
        Side::Incoming => incoming,
    }
}

/// Later occurrences of a duplicated id replace earlier ones.
fn index_by_id<T: SyncRecord>(items: &[T]) -> HashMap<&str, &T> {
    items.iter().map(|item| (item.id(), item)).collect()
}

fn record_conflict<T: SyncRecord>(stats: &mut EntityMergeStats, local: &T, incoming: &T, winner: Side) {
    stats.conflicts += 1;
    stats.conflict_ids.push(local.id().to_string());

    let skew = (incoming.meta().updated_ms() - local.meta().updated_ms()).abs();
    stats.max_clock_skew_ms = stats.max_clock_skew_ms.max(skew);

    match winner {
        Side::Local => stats.resolved_using_local += 1,
        Side::Incoming => stats.resolved_using_incoming += 1,
    }

    let (winning, losing) = match winner {
        Side::Local => (local.meta(), incoming.meta()),
        Side::Incoming => (incoming.meta(), local.meta()),
    };
    if winning.is_deleted() && !losing.is_deleted() {
        stats.deletions_won += 1;
    }
}

fn resolve<T: SyncRecord>(local: &T, incoming: &T) -> Resolution {
    let local_meta = local.meta();
    let incoming_meta = incoming.meta();
    let revision_mode = local_meta.has_revision() || incoming_meta.has_revision();

    if local_meta.is_deleted() != incoming_meta.is_deleted() {
        return Resolution::conflict(resolve_delete_vs_live(
            local_meta,
            incoming_meta,
            revision_mode,
        ));
    }

    if revision_mode {
        match local_meta.rev().cmp(&incoming_meta.rev()) {
            Ordering::Greater => return Resolution::conflict(Side::Local),
            Ordering::Less => return Resolution::conflict(Side::Incoming),
            Ordering::Equal => {}
        }
        if local_meta.rev_by() != incoming_meta.rev_by() {
            let winner = later_update(local_meta, incoming_meta).unwrap_or(
                if local_meta.rev_by() > incoming_meta.rev_by() {
                    Side::Local
                } else {
                    Side::Incoming
                },
            );
            return Resolution::conflict(winner);
        }
    }

    if let Some(winner) = later_update(local_meta, incoming_meta) {
        return Resolution::conflict(winner);
    }

    resolve_by_signature(local, incoming)
}

/// Operation time decides; a tie keeps the tombstone. Without revision
/// metadata the tombstone also wins whenever the two operations fall inside
/// the clock-skew window, since their wall-clock order cannot be trusted.
fn resolve_delete_vs_live(local: &SyncMeta, incoming: &SyncMeta, revision_mode: bool) -> Side {
    let deleted_side = if local.is_deleted() {
        Side::Local
    } else {
        Side::Incoming
    };
    let local_op = local.operation_ms();
    let incoming_op = incoming.operation_ms();

    if !revision_mode && (local_op - incoming_op).abs() <= CLOCK_SKEW_THRESHOLD_MS {
        return deleted_side;
    }

    match local_op.cmp(&incoming_op) {
        Ordering::Greater => Side::Local,
        Ordering::Less => Side::Incoming,
        Ordering::Equal => deleted_side,
    }
}

fn later_update(local: &SyncMeta, incoming: &SyncMeta) -> Option<Side> {
    match local.updated_ms().cmp(&incoming.updated_ms()) {
        Ordering::Greater => Some(Side::Local),
        Ordering::Less => Some(Side::Incoming),
        Ordering::Equal => None,
    }
}

/// Full metadata tie. The lexicographically larger serialized form wins.
fn resolve_by_signature<T: SyncRecord>(local: &T, incoming: &T) -> Resolution {
    let local_signature = local.content_signature();
    let incoming_signature = incoming.content_signature();
    match local_signature.cmp(&incoming_signature) {
        Ordering::Equal => Resolution {
            winner: Side::Local,
            conflict: false,
        },
        Ordering::Greater => Resolution::conflict(Side::Local),
        Ordering::Less => Resolution::conflict(Side::Incoming),
    }
}

/// Enforce `updatedAt >= createdAt`. Returns whether anything changed.
pub(crate) fn normalize_timestamps(meta: &mut SyncMeta) -> bool {
    let Some(created_at) = meta.created_at.as_deref() else {
        return false;
    };
    match (parse_timestamp(created_at), parse_timestamp(&meta.updated_at)) {
        (Some(created), Some(updated)) if updated < created => {
            meta.created_at = Some(meta.updated_at.clone());
            true
        }
        _ => false,
    }
}
