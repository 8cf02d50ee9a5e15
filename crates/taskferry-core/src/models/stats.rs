//! Merge statistics and sync history records

use serde::{Deserialize, Serialize};

/// Maximum number of conflicting ids kept in a history entry.
pub const HISTORY_CONFLICT_ID_LIMIT: usize = 10;

/// Default cap for `settings.lastSyncHistory`.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Terminal state of a sync cycle as persisted in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Conflict,
    Error,
}

/// Counters produced while merging a single collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityMergeStats {
    pub total_local: usize,
    pub total_incoming: usize,
    pub total_merged: usize,
    pub local_only: usize,
    pub incoming_only: usize,
    pub conflicts: usize,
    pub resolved_using_local: usize,
    pub resolved_using_incoming: usize,
    pub deletions_won: usize,
    pub conflict_ids: Vec<String>,
    pub max_clock_skew_ms: i64,
    pub timestamp_adjustments: usize,
}

/// Per-collection stats for a whole snapshot merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeStats {
    pub tasks: EntityMergeStats,
    pub projects: EntityMergeStats,
    pub sections: EntityMergeStats,
    pub areas: EntityMergeStats,
}

impl MergeStats {
    fn collections(&self) -> [&EntityMergeStats; 4] {
        [&self.tasks, &self.projects, &self.sections, &self.areas]
    }

    pub fn total_conflicts(&self) -> usize {
        self.collections().iter().map(|stats| stats.conflicts).sum()
    }

    pub fn max_clock_skew_ms(&self) -> i64 {
        self.collections()
            .iter()
            .map(|stats| stats.max_clock_skew_ms)
            .max()
            .unwrap_or(0)
    }

    pub fn timestamp_adjustments(&self) -> usize {
        self.collections()
            .iter()
            .map(|stats| stats.timestamp_adjustments)
            .sum()
    }

    /// All conflicting ids, in collection order.
    pub fn conflict_ids(&self) -> Vec<String> {
        self.collections()
            .iter()
            .flat_map(|stats| stats.conflict_ids.iter().cloned())
            .collect()
    }
}

/// One row of `settings.lastSyncHistory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    pub at: String,
    pub status: SyncStatus,
    #[serde(default)]
    pub conflicts: usize,
    #[serde(default)]
    pub conflict_ids: Vec<String>,
    #[serde(default)]
    pub max_clock_skew_ms: i64,
    #[serde(default)]
    pub timestamp_adjustments: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncHistoryEntry {
    pub fn from_stats(at: String, status: SyncStatus, stats: &MergeStats) -> Self {
        Self {
            at,
            status,
            conflicts: stats.total_conflicts(),
            conflict_ids: stats
                .conflict_ids()
                .into_iter()
                .take(HISTORY_CONFLICT_ID_LIMIT)
                .collect(),
            max_clock_skew_ms: stats.max_clock_skew_ms(),
            timestamp_adjustments: stats.timestamp_adjustments(),
            error: None,
        }
    }

    pub fn failed(at: String, error: String) -> Self {
        Self {
            at,
            status: SyncStatus::Error,
            conflicts: 0,
            conflict_ids: Vec::new(),
            max_clock_skew_ms: 0,
            timestamp_adjustments: 0,
            error: Some(error),
        }
    }
}

/// Append `entry`, dropping the oldest rows beyond `limit`.
pub fn push_history(history: &mut Vec<SyncHistoryEntry>, entry: SyncHistoryEntry, limit: usize) {
    history.push(entry);
    let limit = limit.max(1);
    if history.len() > limit {
        let overflow = history.len() - limit;
        history.drain(..overflow);
    }
}
