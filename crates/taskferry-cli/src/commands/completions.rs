use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Generator, Shell};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

const BIN_NAME: &str = "taskferry";

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
            CompletionShell::PowerShell => Self::PowerShell,
        }
    }
}

/// Print the script, or write it to `output`. A directory gets the file
/// name the shell expects (`_taskferry` for zsh).
pub fn run_completions(shell: CompletionShell, output: Option<&Path>) -> Result<(), CliError> {
    let script = render_completions(shell);
    let Some(output) = output else {
        io::stdout().write_all(&script)?;
        return Ok(());
    };

    let target = completion_target(shell, output);
    if let Some(parent) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, &script)?;
    println!("{}", target.display());
    Ok(())
}

pub fn render_completions(shell: CompletionShell) -> Vec<u8> {
    let mut script = Vec::new();
    generate(Shell::from(shell), &mut Cli::command(), BIN_NAME, &mut script);
    script
}

pub fn completion_target(shell: CompletionShell, output: &Path) -> PathBuf {
    if output.is_dir() {
        output.join(Shell::from(shell).file_name(BIN_NAME))
    } else {
        output.to_path_buf()
    }
}
