use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;
use serde_json::json;
use taskferry_core::config::{read_secrets_file, SECRETS_FILE_NAME};
use taskferry_core::models::timestamp::parse_timestamp;
use taskferry_core::models::{DeviceId, MergeStats, SyncHistoryEntry, SyncStatus};
use taskferry_core::sync::CycleReport;
use taskferry_core::{AppData, BackendConfig, SyncOutcome, TriggerOutcome};

use crate::cli::{BackendArg, Cli, Commands, CompletionShell, ConfigCommands};
use crate::commands::common::{
    download_dir, format_conflict_count, format_relative_time, load_local_data, recent_history,
    status_item,
};
use crate::commands::completions::{completion_target, render_completions, run_completions};
use crate::commands::config::{describe_config, run_config_init, ConfigInitArgs};
use crate::commands::purge::purge_data;
use crate::commands::sync::{describe_outcome, run_sync};
use crate::error::CliError;

fn at(value: &str) -> DateTime<Utc> {
    parse_timestamp(value).unwrap()
}

fn history_entry(at: &str, status: SyncStatus) -> SyncHistoryEntry {
    SyncHistoryEntry::from_stats(at.to_string(), status, &MergeStats::default())
}

fn file_backend_args(sync_path: &Path) -> ConfigInitArgs {
    ConfigInitArgs {
        backend: Some(BackendArg::File),
        sync_path: Some(sync_path.to_path_buf()),
        ..ConfigInitArgs::default()
    }
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_purge_flags() {
    let cli = Cli::try_parse_from([
        "taskferry",
        "purge",
        "--retention-days",
        "30",
        "--dry-run",
        "--data-path",
        "/tmp/data.json",
    ])
    .unwrap();

    assert_eq!(cli.data_path, Some(PathBuf::from("/tmp/data.json")));
    assert!(matches!(
        cli.command,
        Commands::Purge {
            retention_days: Some(30),
            after_days: None,
            dry_run: true
        }
    ));
}

#[test]
fn parses_config_init_backend() {
    let cli = Cli::try_parse_from([
        "taskferry",
        "config",
        "init",
        "--backend",
        "webdav",
        "--webdav-url",
        "https://dav.example.com/tasks",
    ])
    .unwrap();

    let Commands::Config {
        command: ConfigCommands::Init {
            backend,
            webdav_url,
            ..
        },
    } = cli.command
    else {
        panic!("expected config init");
    };
    assert_eq!(backend, Some(BackendArg::Webdav));
    assert_eq!(webdav_url.as_deref(), Some("https://dav.example.com/tasks"));
}

#[test]
fn rejects_unknown_backend_argument() {
    assert!(Cli::try_parse_from(["taskferry", "config", "init", "--backend", "ftp"]).is_err());
}

#[test]
fn format_relative_time_buckets() {
    let now = 10 * 365 * 24 * 60 * 60 * 1000_i64;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 60 * 60_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 24 * 60 * 60_000, now), "2d ago");
}

#[test]
fn conflict_count_is_pluralized() {
    assert_eq!(format_conflict_count(0), "0 conflicts");
    assert_eq!(format_conflict_count(1), "1 conflict");
    assert_eq!(format_conflict_count(4), "4 conflicts");
}

#[test]
fn recent_history_is_newest_first() {
    let history = vec![
        history_entry("2024-06-01T10:00:00.000Z", SyncStatus::Success),
        history_entry("2024-06-01T11:00:00.000Z", SyncStatus::Conflict),
        history_entry("2024-06-01T12:00:00.000Z", SyncStatus::Success),
    ];

    let recent = recent_history(&history, 2);

    let stamps: Vec<_> = recent.iter().map(|entry| entry.at.as_str()).collect();
    assert_eq!(
        stamps,
        vec!["2024-06-01T12:00:00.000Z", "2024-06-01T11:00:00.000Z"]
    );
}

#[test]
fn status_item_reports_last_error() {
    let mut data = AppData::default();
    data.settings.last_sync_at = Some("2024-06-01T12:00:00.000Z".to_string());
    data.settings.last_sync_status = Some(SyncStatus::Error);
    data.settings.last_sync_error = Some("Network error: reset".to_string());

    let item = status_item(&data, Path::new("/tmp/data.json"), 5);
    let value = serde_json::to_value(&item).unwrap();

    assert_eq!(value["lastSyncStatus"], json!("error"));
    assert_eq!(value["lastSyncError"], json!("Network error: reset"));
    assert_eq!(value["history"], json!([]));
}

#[test]
fn downloads_land_next_to_data_file() {
    assert_eq!(
        download_dir(Path::new("/home/me/.local/share/taskferry/data.json")),
        PathBuf::from("/home/me/.local/share/taskferry/attachments")
    );
}

#[test]
fn describe_outcome_mentions_conflicts() {
    let mut report = CycleReport::default();
    report.stats.tasks.conflicts = 2;
    report.attachments.uploaded = 1;

    assert_eq!(
        describe_outcome(&TriggerOutcome::Completed(SyncOutcome::Conflict(report))),
        "Sync completed with 2 conflicts (1 uploaded, 0 downloaded)"
    );
    assert_eq!(
        describe_outcome(&TriggerOutcome::Completed(SyncOutcome::Success(
            CycleReport::default()
        ))),
        "Sync completed"
    );
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("taskferry"));
}

#[test]
fn completions_into_directory_use_shell_file_name() {
    let dir = tempfile::tempdir().unwrap();

    run_completions(CompletionShell::Zsh, Some(dir.path())).unwrap();

    let written = dir.path().join("_taskferry");
    assert_eq!(completion_target(CompletionShell::Zsh, dir.path()), written);
    let script = std::fs::read_to_string(written).unwrap();
    assert!(script.contains("#compdef taskferry"));
    assert_eq!(
        completion_target(CompletionShell::Fish, &dir.path().join("nested/ferry.fish")),
        dir.path().join("nested/ferry.fish")
    );
}

#[test]
fn config_init_keeps_secrets_out_of_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let args = ConfigInitArgs {
        backend: Some(BackendArg::Cloud),
        cloud_url: Some("https://sync.example.com/v1/".to_string()),
        cloud_token: Some("s3cret".to_string()),
        ..ConfigInitArgs::default()
    };

    let config = run_config_init(dir.path(), args).unwrap();

    assert_eq!(
        config.backend,
        BackendConfig::Cloud {
            url: "https://sync.example.com/v1".to_string(),
            token: Some("s3cret".to_string()),
        }
    );
    let config_text = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(!config_text.contains("s3cret"));
    assert!(config_text.contains(&config.device_id.to_string()));
    let secrets = read_secrets_file(&dir.path().join(SECRETS_FILE_NAME)).unwrap();
    assert_eq!(secrets.cloud_token.as_deref(), Some("s3cret"));

    let described = describe_config(&config, Some(PathBuf::from("/tmp/data.json"))).unwrap();
    assert!(described.contains(&"cloud_token: [REDACTED]".to_string()));
}

#[test]
fn config_init_rejects_invalid_url_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let args = ConfigInitArgs {
        backend: Some(BackendArg::Webdav),
        webdav_url: Some("dav.example.com".to_string()),
        ..ConfigInitArgs::default()
    };

    let error = run_config_init(dir.path(), args).unwrap_err();

    assert!(matches!(error, CliError::Core(_)));
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn config_init_updates_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    let first = run_config_init(dir.path(), file_backend_args(Path::new("/tmp/one"))).unwrap();
    let second = run_config_init(
        dir.path(),
        ConfigInitArgs {
            sync_path: Some(PathBuf::from("/tmp/two")),
            ..ConfigInitArgs::default()
        },
    )
    .unwrap();

    assert_eq!(first.device_id, second.device_id);
    assert_eq!(
        second.backend,
        BackendConfig::File {
            path: PathBuf::from("/tmp/two")
        }
    );
}

#[test]
fn purge_marks_then_drops_old_tombstones() {
    let device = DeviceId::new();
    let mut data: AppData = serde_json::from_value(json!({
        "tasks": [
            {"id": "old", "updatedAt": "2024-01-01T00:00:00.000Z", "deletedAt": "2024-01-01T00:00:00.000Z"},
            {"id": "expired", "updatedAt": "2023-01-01T00:00:00.000Z",
             "deletedAt": "2023-01-01T00:00:00.000Z", "purgedAt": "2023-01-02T00:00:00.000Z"},
            {"id": "live", "updatedAt": "2024-05-01T00:00:00.000Z"}
        ]
    }))
    .unwrap();

    let summary = purge_data(&mut data, at("2024-06-01T00:00:00Z"), 30, 90, &device);

    assert_eq!(summary.scheduled, 1);
    assert_eq!(summary.removed.removed_tasks, 1);
    let ids: Vec<_> = data.tasks.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(ids, vec!["old", "live"]);
    assert!(data.tasks[0].purged_at.is_some());
}

#[tokio::test]
async fn sync_with_file_backend_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("config");
    let shared = dir.path().join("shared");
    let data_path = dir.path().join("local").join("data.json");
    std::fs::create_dir_all(data_path.parent().unwrap()).unwrap();
    std::fs::write(
        &data_path,
        serde_json::to_string(&json!({
            "tasks": [{"id": "t1", "title": "Water plants", "updatedAt": "2024-05-01T00:00:00.000Z"}]
        }))
        .unwrap(),
    )
    .unwrap();
    run_config_init(&config_dir, file_backend_args(&shared)).unwrap();

    run_sync(&config_dir, Some(data_path.clone())).await.unwrap();

    let remote: AppData =
        serde_json::from_str(&std::fs::read_to_string(shared.join("data.json")).unwrap()).unwrap();
    assert_eq!(remote.tasks.len(), 1);
    let local = load_local_data(&data_path).await.unwrap();
    assert_eq!(local.settings.last_sync_status, Some(SyncStatus::Success));
}

#[tokio::test]
async fn sync_without_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    let error = run_sync(dir.path(), Some(dir.path().join("data.json")))
        .await
        .unwrap_err();

    assert!(matches!(error, CliError::SyncNotConfigured));
}
