use std::path::{Path, PathBuf};

use taskferry_core::sync::CycleReport;
use taskferry_core::{SyncCoordinator, SyncOutcome, TriggerOutcome};
use tracing::info;

use crate::commands::common::{
    format_conflict_count, load_sync_config, open_engine, resolve_data_path,
};
use crate::error::CliError;

pub async fn run_sync(config_dir: &Path, cli_data_path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_sync_config(config_dir)?;
    let data_path = resolve_data_path(cli_data_path, config.data_path.as_deref())?;
    info!(
        backend = %config.backend.kind(),
        target = %config.backend.target(),
        data_path = %data_path.display(),
        "starting sync"
    );

    let coordinator = SyncCoordinator::new(open_engine(&config, &data_path)?);
    let outcome = coordinator.trigger().await?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

pub fn describe_outcome(outcome: &TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Queued => "Sync already running; queued another cycle".to_string(),
        TriggerOutcome::Completed(SyncOutcome::Aborted) => {
            "Sync skipped: local data changed during the cycle".to_string()
        }
        TriggerOutcome::Completed(SyncOutcome::Success(report)) => {
            format!("Sync completed{}", describe_report(report))
        }
        TriggerOutcome::Completed(SyncOutcome::Conflict(report)) => format!(
            "Sync completed with {}{}",
            format_conflict_count(report.stats.total_conflicts()),
            describe_report(report)
        ),
    }
}

fn describe_report(report: &CycleReport) -> String {
    let mut parts = Vec::new();
    if !report.purged.is_empty() {
        parts.push(format!(
            "purged {} tasks and {} attachments",
            report.purged.removed_tasks, report.purged.removed_attachments
        ));
    }
    let attachments = &report.attachments;
    if attachments.uploaded > 0 || attachments.downloaded > 0 {
        parts.push(format!(
            "{} uploaded, {} downloaded",
            attachments.uploaded, attachments.downloaded
        ));
    }
    if attachments.failed > 0 {
        parts.push(format!("{} attachment transfers failed", attachments.failed));
    }
    if attachments.rate_limited {
        parts.push("attachment transfers paused by rate limiting".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join("; "))
    }
}
