//! A single sync cycle.
//!
//! The order is fixed: read-local, read-remote, merge, write-local,
//! write-remote, then the attachment pass. Both inputs and the merged result
//! are validated before anything is written, and the live local version is
//! rechecked before every write so a fresher local edit is never clobbered.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::freshness::{LocalVersion, Snapshot};
use crate::attachments::{AttachmentReport, AttachmentSyncer, TransferOptions};
use crate::backend::RemoteBackend;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::merge::{merge_app_data, CLOCK_SKEW_THRESHOLD_MS};
use crate::models::timestamp::format_timestamp;
use crate::models::{push_history, MergeStats, Settings, SyncHistoryEntry, SyncStatus};
use crate::storage::{empty_snapshot, LocalStore};
use crate::tombstone::{purge_expired_tombstones, PurgeReport};
use crate::validate::{decode_snapshot, validate_merged};
use crate::{Error, Result};

/// What a completed cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stats: MergeStats,
    pub purged: PurgeReport,
    pub attachments: AttachmentReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(CycleReport),
    Conflict(CycleReport),
    /// Local data changed mid-cycle; nothing stale was written.
    Aborted,
}

impl SyncOutcome {
    pub const fn status(&self) -> Option<SyncStatus> {
        match self {
            Self::Success(_) => Some(SyncStatus::Success),
            Self::Conflict(_) => Some(SyncStatus::Conflict),
            Self::Aborted => None,
        }
    }

    pub const fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Success(report) | Self::Conflict(report) => Some(report),
            Self::Aborted => None,
        }
    }
}

/// Runs cycles between one local store and one remote backend.
pub struct SyncEngine<L, R> {
    local: L,
    remote: R,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    version: Arc<LocalVersion>,
    attachments: AttachmentSyncer,
}

impl<L, R> SyncEngine<L, R>
where
    L: LocalStore,
    R: RemoteBackend,
{
    pub fn new(
        local: L,
        remote: R,
        config: EngineConfig,
        download_dir: PathBuf,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let options = TransferOptions {
            retry: config.retry,
            throttle: config.webdav,
            backoff: config.backoff,
            attachments: config.attachments.clone(),
            download_dir,
        };
        Self {
            attachments: AttachmentSyncer::new(options, Arc::clone(&clock)),
            local,
            remote,
            config,
            clock,
            version: Arc::new(LocalVersion::new()),
        }
    }

    /// Share a version counter the host bumps on local mutations.
    #[must_use]
    pub fn with_version(mut self, version: Arc<LocalVersion>) -> Self {
        self.version = version;
        self
    }

    pub const fn version(&self) -> &Arc<LocalVersion> {
        &self.version
    }

    pub const fn local(&self) -> &L {
        &self.local
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Run one cycle. Nothing is written when an input or the merged result
    /// fails validation.
    pub async fn run_cycle(&self) -> Result<SyncOutcome> {
        let started = Instant::now();
        let result = self.cycle().await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(SyncOutcome::Aborted) => {
                info!(elapsed_ms, "sync cycle aborted, local data changed");
            }
            Ok(outcome) => {
                let conflicts = outcome
                    .report()
                    .map_or(0, |report| report.stats.total_conflicts());
                info!(elapsed_ms, conflicts, status = ?outcome.status(), "sync cycle finished");
            }
            Err(error) => warn!(elapsed_ms, %error, "sync cycle failed"),
        }
        result
    }

    /// Record a failed cycle in the local settings.
    pub async fn record_failure(&self, error: &Error) -> Result<()> {
        let mut data = decode_snapshot(self.load_local().await?, "local")?;
        let at = format_timestamp(self.clock.now());
        let message = error.to_string();
        let settings = &mut data.settings;
        push_history(
            &mut settings.last_sync_history,
            SyncHistoryEntry::failed(at.clone(), message.clone()),
            self.config.history_limit,
        );
        settings.last_sync_at = Some(at);
        settings.last_sync_status = Some(SyncStatus::Error);
        settings.last_sync_error = Some(message);
        self.local.save(&data).await
    }

    async fn cycle(&self) -> Result<SyncOutcome> {
        self.local.flush_pending().await?;
        let snapshot = self.version.snapshot();

        let mut local = decode_snapshot(self.load_local().await?, "local")?;
        let remote_value = self.remote.get_json().await?;
        if remote_value.is_none() {
            debug!(backend = %self.remote.kind(), "remote has no snapshot yet");
        }
        let mut remote =
            decode_snapshot(remote_value.unwrap_or_else(empty_snapshot), "remote")?;

        let now = self.clock.now();
        let retention = self.config.tombstone_retention_days;
        let mut purged = purge_expired_tombstones(&mut local, now, retention);
        purged += purge_expired_tombstones(&mut remote, now, retention);

        let (mut merged, stats) = merge_app_data(&local, &remote);
        let status = if stats.total_conflicts() > 0 {
            SyncStatus::Conflict
        } else {
            SyncStatus::Success
        };
        let skew = stats.max_clock_skew_ms();
        if skew > CLOCK_SKEW_THRESHOLD_MS {
            warn!(
                max_clock_skew_ms = skew,
                "device clocks disagree, conflict resolution may be unreliable"
            );
        }
        self.stamp_success(&mut merged.settings, status, &stats);

        purged += purge_expired_tombstones(&mut merged, now, retention);
        validate_merged(&merged)?;

        if !self.is_fresh(snapshot, "write-local") {
            return Ok(SyncOutcome::Aborted);
        }
        self.local.save(&merged).await?;
        if !self.is_fresh(snapshot, "write-remote") {
            return Ok(SyncOutcome::Aborted);
        }
        self.remote.put_json(&merged.for_remote()).await?;

        let attachments = self.attachments.run(&self.remote, &mut merged).await;
        if attachments.mutated {
            if !self.is_fresh(snapshot, "attachment write-local") {
                return Ok(SyncOutcome::Aborted);
            }
            self.local.save(&merged).await?;
            if !self.is_fresh(snapshot, "attachment write-remote") {
                return Ok(SyncOutcome::Aborted);
            }
            self.remote.put_json(&merged.for_remote()).await?;
        }

        let report = CycleReport {
            stats,
            purged,
            attachments,
        };
        Ok(match status {
            SyncStatus::Conflict => SyncOutcome::Conflict(report),
            SyncStatus::Success | SyncStatus::Error => SyncOutcome::Success(report),
        })
    }

    async fn load_local(&self) -> Result<Value> {
        let timeout = self.config.local_read_timeout();
        tokio::time::timeout(timeout, self.local.load())
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    fn stamp_success(
        &self,
        settings: &mut Settings,
        status: SyncStatus,
        stats: &MergeStats,
    ) {
        let at = format_timestamp(self.clock.now());
        push_history(
            &mut settings.last_sync_history,
            SyncHistoryEntry::from_stats(at.clone(), status, stats),
            self.config.history_limit,
        );
        settings.last_sync_at = Some(at);
        settings.last_sync_status = Some(status);
        settings.last_sync_stats = Some(stats.clone());
        settings.last_sync_error = None;
    }

    fn is_fresh(&self, snapshot: Snapshot, stage: &str) -> bool {
        let fresh = snapshot.is_current(&self.version);
        if !fresh {
            info!(
                stage,
                captured_at = snapshot.captured_at,
                current = self.version.current(),
                "local data changed during sync"
            );
        }
        fresh
    }
}
