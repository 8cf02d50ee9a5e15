use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use taskferry_core::BackendKind;

#[derive(Parser)]
#[command(name = "taskferry")]
#[command(about = "Keep your task data in sync across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding config.toml and secrets.toml
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Local data file (overrides data_path from config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync cycle against the configured backend
    Sync,
    /// Show the result of recent sync cycles
    Status {
        /// Number of history rows to show
        #[arg(short, long, default_value = "5")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark old deleted tasks for purge and drop expired tombstones
    Purge {
        /// Days a purge mark is kept before the task is dropped
        #[arg(long, value_name = "DAYS")]
        retention_days: Option<i64>,
        /// Days after deletion before a task is marked for purge
        #[arg(long, value_name = "DAYS")]
        after_days: Option<i64>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Configure the sync backend
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum BackendArg {
    File,
    Webdav,
    Cloud,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::File => Self::File,
            BackendArg::Webdav => Self::WebDav,
            BackendArg::Cloud => Self::Cloud,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update config.toml and secrets.toml
    Init {
        /// Backend to sync with
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
        /// Shared folder for the file backend
        #[arg(long, value_name = "DIR")]
        sync_path: Option<PathBuf>,
        /// WebDAV folder URL
        #[arg(long, value_name = "URL")]
        webdav_url: Option<String>,
        #[arg(long, value_name = "NAME")]
        webdav_username: Option<String>,
        /// Stored in secrets.toml
        #[arg(long, value_name = "PASSWORD")]
        webdav_password: Option<String>,
        /// Cloud sync endpoint URL
        #[arg(long, value_name = "URL")]
        cloud_url: Option<String>,
        /// Stored in secrets.toml
        #[arg(long, value_name = "TOKEN")]
        cloud_token: Option<String>,
    },
    /// Print the resolved configuration without credentials
    Show,
}
