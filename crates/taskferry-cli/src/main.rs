//! taskferry CLI - Sync task data between devices from the terminal
//!
//! Runs the sync engine against a local JSON data file and the backend set
//! up with `taskferry config init`.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use taskferry_core::config::{read_config_file, CONFIG_FILE_NAME};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_config_dir;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::purge::run_purge;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskferry=info,taskferry_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync => {
            let config_dir = resolve_config_dir(cli.config_dir)?;
            run_sync(&config_dir, cli.data_path).await?;
        }
        Commands::Status { limit, json } => {
            let config_dir = resolve_config_dir(cli.config_dir)?;
            let config = read_config_file(&config_dir.join(CONFIG_FILE_NAME))?;
            run_status(config.data_path.as_deref(), cli.data_path, limit, json).await?;
        }
        Commands::Purge {
            retention_days,
            after_days,
            dry_run,
        } => {
            let config_dir = resolve_config_dir(cli.config_dir)?;
            run_purge(&config_dir, cli.data_path, retention_days, after_days, dry_run).await?;
        }
        Commands::Config { command } => {
            let config_dir = resolve_config_dir(cli.config_dir)?;
            run_config(command, &config_dir, cli.data_path)?;
        }
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
