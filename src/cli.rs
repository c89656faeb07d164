// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::IdentitySource;

/// Command-line arguments for `procwarden`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procwarden",
    version,
    about = "Run a command with a timeout, optionally as another user, and reap everything it starts.",
    long_about = None
)]
pub struct CliArgs {
    /// Job file (TOML) describing the command to run.
    ///
    /// Flags given on the command line override values from the file.
    #[arg(long, value_name = "PATH")]
    pub job: Option<PathBuf>,

    /// Timeout in seconds. Required unless a job file provides one.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run the command as this user (requires privileges to switch).
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,

    /// Force `HOME` to this directory for the command.
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Working directory for the command.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Environment variable for the command (repeatable).
    ///
    /// Giving any `--env` replaces the inherited environment.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Where user identities are looked up: `nss` or `id`.
    #[arg(long, value_name = "SOURCE")]
    pub identity_source: Option<IdentitySource>,

    /// Discard the command's output instead of forwarding it.
    #[arg(long)]
    pub discard_output: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCWARDEN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print what would run, without running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Command and arguments, after `--`.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
