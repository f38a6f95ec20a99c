//! Command-line surface.
//!
//! The outer CLI is intentionally thin: one target (an agent file, a URL,
//! or a subcommand name) plus a raw trailing vector that belongs to the
//! agent run. Flags for the driver are unknowable ahead of time, so clap
//! only shapes the outline; [`hijack`] pulls out the `--_*` flags that
//! are ours.
//!
//! Subcommands:
//! - `create <name>` - write a starter agent file
//! - `setup` - pointer to the shell-configuration wizard
//! - `logs <agent>` - show the agent's debug-log location and tail
//! - `help` - usage

pub mod hijack;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::core::MdflowError;
use crate::runner;

/// Run markdown files as AI-agent scripts.
#[derive(Parser, Debug)]
#[command(
    name = "mdflow",
    version,
    about = "Run markdown files as AI-agent scripts",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Agent file, URL, or subcommand (create, setup, logs, help)
    pub target: Option<String>,

    /// Arguments for the agent: template variables (--_name value),
    /// driver flags, and positionals
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Dispatch to a subcommand or the agent runner; returns the exit code.
    pub async fn execute(self) -> Result<i32> {
        let Some(target) = self.target else {
            if std::io::stdin().is_terminal() {
                // The interactive file picker lives outside the core.
                return Err(MdflowError::ConfigurationError {
                    message: "no agent file given".to_string(),
                }
                .into());
            }
            return Err(MdflowError::ConfigurationError {
                message: "no agent file given and stdin is not a terminal".to_string(),
            }
            .into());
        };

        match target.as_str() {
            "create" => {
                create_agent(self.args.first().map(String::as_str))?;
                Ok(0)
            }
            "setup" => {
                println!("Shell integration is configured by the separate setup wizard.");
                println!("See the mdflow documentation for your shell.");
                Ok(0)
            }
            "logs" => {
                show_logs(self.args.first().map(String::as_str))?;
                Ok(0)
            }
            "help" => {
                Cli::command().print_help().ok();
                println!();
                Ok(0)
            }
            _ => runner::run(&target, &self.args).await,
        }
    }
}

/// `mdflow create <name>`: write a starter agent file.
fn create_agent(name: Option<&str>) -> Result<()> {
    let name = name.ok_or_else(|| MdflowError::ConfigurationError {
        message: "usage: mdflow create <name>.<driver>.md".to_string(),
    })?;
    let file_name = if name.ends_with(".md") {
        name.to_string()
    } else {
        format!("{name}.claude.md")
    };
    let path = PathBuf::from(&file_name);
    if path.exists() {
        return Err(MdflowError::ConfigurationError {
            message: format!("'{file_name}' already exists"),
        }
        .into());
    }

    let starter = "---\n# Front matter becomes driver flags; _keys are template defaults.\n# model: opus\n---\n\nDescribe the task here. Reference files with @./path, run\ncommands with !`cmd`, and interpolate {{ _variables }}.\n";
    std::fs::write(&path, starter)?;
    println!("Created {file_name}");
    Ok(())
}

/// `mdflow logs <agent>`: print the debug log path and its tail.
fn show_logs(agent: Option<&str>) -> Result<()> {
    let agent = agent.ok_or_else(|| MdflowError::ConfigurationError {
        message: "usage: mdflow logs <agent>".to_string(),
    })?;
    let path = runner::locate::agent_log_path(agent)?;
    println!("{}", path.display());
    if let Ok(text) = std::fs::read_to_string(&path) {
        let lines: Vec<&str> = text.lines().collect();
        let tail_start = lines.len().saturating_sub(20);
        for line in &lines[tail_start..] {
            println!("{line}");
        }
    }
    Ok(())
}
