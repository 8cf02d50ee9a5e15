use std::path::{Path, PathBuf};

use taskferry_core::config::{
    normalize_text_option, read_config_file, read_secrets_file, write_config_files, ConfigFile,
    SecretsFile, CONFIG_FILE_NAME, SECRETS_FILE_NAME,
};
use taskferry_core::{BackendConfig, BackendKind, SyncConfig};

use crate::cli::{BackendArg, ConfigCommands};
use crate::commands::common::{default_sync_path, load_sync_config, resolve_data_path};
use crate::error::CliError;

/// Values passed to `config init`. Unset fields keep what is on disk.
#[derive(Debug, Default)]
pub struct ConfigInitArgs {
    pub backend: Option<BackendArg>,
    pub sync_path: Option<PathBuf>,
    pub webdav_url: Option<String>,
    pub webdav_username: Option<String>,
    pub webdav_password: Option<String>,
    pub cloud_url: Option<String>,
    pub cloud_token: Option<String>,
}

pub fn run_config(
    command: ConfigCommands,
    config_dir: &Path,
    cli_data_path: Option<PathBuf>,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            backend,
            sync_path,
            webdav_url,
            webdav_username,
            webdav_password,
            cloud_url,
            cloud_token,
        } => {
            let args = ConfigInitArgs {
                backend,
                sync_path,
                webdav_url,
                webdav_username,
                webdav_password,
                cloud_url,
                cloud_token,
            };
            let config = run_config_init(config_dir, args)?;
            println!(
                "Saved {} ({} backend: {})",
                config_dir.join(CONFIG_FILE_NAME).display(),
                config.backend.kind(),
                config.backend.target()
            );
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_sync_config(config_dir)?;
            for line in describe_config(&config, cli_data_path)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Merge `args` into the files in `config_dir` and validate the result
/// before anything is written.
pub fn run_config_init(config_dir: &Path, args: ConfigInitArgs) -> Result<SyncConfig, CliError> {
    let mut config = read_config_file(&config_dir.join(CONFIG_FILE_NAME))?;
    let mut secrets = read_secrets_file(&config_dir.join(SECRETS_FILE_NAME))?;

    if let Some(backend) = args.backend {
        config.sync_backend = Some(BackendKind::from(backend).to_string());
    }
    if let Some(sync_path) = args.sync_path {
        config.sync_path = Some(sync_path);
    }
    override_text(&mut config.webdav_url, args.webdav_url);
    override_text(&mut config.webdav_username, args.webdav_username);
    override_text(&mut config.cloud_url, args.cloud_url);
    override_text(&mut secrets.webdav_password, args.webdav_password);
    override_text(&mut secrets.cloud_token, args.cloud_token);

    let is_file_backend = config
        .sync_backend
        .as_deref()
        .map_or(true, |name| name.trim().eq_ignore_ascii_case("file"));
    if is_file_backend && config.sync_path.is_none() {
        config.sync_path = default_sync_path();
    }

    let resolved = resolve_for_init(config.clone(), secrets.clone())?;
    if config.device_id.is_none() {
        config.device_id = Some(resolved.device_id.to_string());
    }
    write_config_files(config_dir, &config, &secrets)?;
    Ok(resolved)
}

pub fn describe_config(
    config: &SyncConfig,
    cli_data_path: Option<PathBuf>,
) -> Result<Vec<String>, CliError> {
    let data_path = resolve_data_path(cli_data_path, config.data_path.as_deref())?;
    let mut lines = vec![
        format!("device_id: {}", config.device_id),
        format!("data_path: {}", data_path.display()),
        format!("backend: {}", config.backend.kind()),
        format!("target: {}", config.backend.target()),
    ];
    match &config.backend {
        BackendConfig::File { .. } => {}
        BackendConfig::WebDav {
            username, password, ..
        } => {
            lines.push(format!("webdav_username: {username}"));
            lines.push(format!("webdav_password: {}", redacted(password.as_ref())));
        }
        BackendConfig::Cloud { token, .. } => {
            lines.push(format!("cloud_token: {}", redacted(token.as_ref())));
        }
    }
    lines.push(format!(
        "tombstone_retention_days: {}",
        config.engine.tombstone_retention_days
    ));
    Ok(lines)
}

fn resolve_for_init(config: ConfigFile, secrets: SecretsFile) -> Result<SyncConfig, CliError> {
    let config = ConfigFile {
        device_id: config
            .device_id
            .or_else(|| Some(taskferry_core::DeviceId::new().to_string())),
        ..config
    };
    // Environment credentials are not persisted, so they play no part here.
    Ok(SyncConfig::resolve(config, secrets, |_| None)?)
}

fn override_text(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *slot = normalize_text_option(Some(value));
    }
}

const fn redacted<T>(value: Option<&T>) -> &'static str {
    if value.is_some() {
        "[REDACTED]"
    } else {
        "(not set)"
    }
}
