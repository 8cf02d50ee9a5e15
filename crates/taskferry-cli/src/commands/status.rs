use std::path::{Path, PathBuf};

use crate::commands::common::{
    format_history_lines, format_sync_time, load_local_data, resolve_data_path, status_item,
    status_label,
};
use crate::error::CliError;

pub async fn run_status(
    configured_data_path: Option<&Path>,
    cli_data_path: Option<PathBuf>,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let data_path = resolve_data_path(cli_data_path, configured_data_path)?;
    let data = load_local_data(&data_path).await?;
    let item = status_item(&data, &data_path, limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    let Some(last_sync_at) = item.last_sync_at.as_deref() else {
        println!("Never synced ({})", item.data_path);
        return Ok(());
    };
    let status = item.last_sync_status.map_or("unknown", status_label);
    println!("Last sync: {} ({status})", format_sync_time(last_sync_at));
    if let Some(error) = &item.last_sync_error {
        println!("Last error: {error}");
    }
    for line in format_history_lines(&item.history) {
        println!("  {line}");
    }
    Ok(())
}
