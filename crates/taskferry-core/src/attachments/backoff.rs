//! Per-attachment backoff between sync cycles.
//!
//! An attachment that keeps failing is skipped until its backoff expires.
//! A file the remote does not have is unlikely to appear soon, so that case
//! waits much longer than a transient failure.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub missing_remote_secs: u64,
    pub transient_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            missing_remote_secs: 30 * 60,
            transient_secs: 2 * 60,
        }
    }
}

/// Why an attachment is backing off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffReason {
    MissingOnRemote,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BackoffEntry {
    until: DateTime<Utc>,
    reason: BackoffReason,
}

#[derive(Debug, Default)]
pub struct BackoffTable {
    config: BackoffConfig,
    entries: HashMap<String, BackoffEntry>,
}

impl BackoffTable {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Reason the attachment is still backing off at `now`.
    pub fn blocked(&self, attachment_id: &str, now: DateTime<Utc>) -> Option<BackoffReason> {
        self.entries
            .get(attachment_id)
            .filter(|entry| entry.until > now)
            .map(|entry| entry.reason)
    }

    pub fn record(&mut self, attachment_id: &str, reason: BackoffReason, now: DateTime<Utc>) {
        let secs = match reason {
            BackoffReason::MissingOnRemote => self.config.missing_remote_secs,
            BackoffReason::Transient => self.config.transient_secs,
        };
        // Oversized settings saturate to the latest representable time.
        let until = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries
            .insert(attachment_id.to_string(), BackoffEntry { until, reason });
    }

    pub fn clear(&mut self, attachment_id: &str) {
        self.entries.remove(attachment_id);
    }

    /// Drop entries whose backoff has expired.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.until > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
