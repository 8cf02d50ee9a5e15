use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use taskferry_core::models::DeviceId;
use taskferry_core::tombstone::{
    clamp_retention_days, purge_expired_tombstones, schedule_purge, PurgeReport,
};
use taskferry_core::{AppData, JsonFileStore, LocalStore};

use crate::commands::common::{load_local_data, load_sync_config, resolve_data_path};
use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSummary {
    pub scheduled: usize,
    pub removed: PurgeReport,
}

impl PurgeSummary {
    pub const fn is_empty(&self) -> bool {
        self.scheduled == 0 && self.removed.is_empty()
    }
}

pub async fn run_purge(
    config_dir: &Path,
    cli_data_path: Option<PathBuf>,
    retention_days: Option<i64>,
    after_days: Option<i64>,
    dry_run: bool,
) -> Result<(), CliError> {
    let config = load_sync_config(config_dir)?;
    let data_path = resolve_data_path(cli_data_path, config.data_path.as_deref())?;
    let retention_days = clamp_retention_days(
        retention_days.unwrap_or(config.engine.tombstone_retention_days),
    );
    let after_days = after_days.unwrap_or(config.engine.purge_after_days);

    let mut data = load_local_data(&data_path).await?;
    let summary = purge_data(
        &mut data,
        Utc::now(),
        after_days,
        retention_days,
        &config.device_id,
    );

    if summary.is_empty() {
        println!("Nothing to purge");
        return Ok(());
    }
    if !dry_run {
        JsonFileStore::new(&data_path).save(&data).await?;
    }
    let prefix = if dry_run { "Would mark" } else { "Marked" };
    println!(
        "{prefix} {} tasks for purge; removed {} expired tasks and {} attachments (retention {retention_days} days)",
        summary.scheduled, summary.removed.removed_tasks, summary.removed.removed_attachments
    );
    Ok(())
}

pub fn purge_data(
    data: &mut AppData,
    now: DateTime<Utc>,
    after_days: i64,
    retention_days: i64,
    device: &DeviceId,
) -> PurgeSummary {
    let scheduled = schedule_purge(data, now, after_days, device);
    let removed = purge_expired_tombstones(data, now, retention_days);
    PurgeSummary { scheduled, removed }
}
