// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `gitwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gitwatch",
    version,
    about = "Writes to stdout whenever one of the given git repositories receives a commit.",
    long_about = None
)]
pub struct CliArgs {
    /// Repositories to watch, as `url` or `url#branch`.
    #[arg(value_name = "REPOSITORY")]
    pub repositories: Vec<String>,

    /// Time between checks, e.g. `100ms`, `30s`, `5m`.
    #[arg(long, env = "GITWATCH_INTERVAL", value_name = "DURATION")]
    pub interval: Option<String>,

    /// Directory local copies are stored in.
    #[arg(long, env = "GITWATCH_DIRECTORY", value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Emit one event per repository after the initial clone/check.
    #[arg(long, env = "GITWATCH_INITIAL_EVENT")]
    pub initial_event: bool,

    /// Private key used for SSH remotes. The SSH agent is used otherwise.
    #[arg(long, value_name = "PATH")]
    pub ssh_key: Option<PathBuf>,

    /// Optional TOML config file; command-line values take precedence.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GITWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved repositories, but don't clone or poll.
    #[arg(long)]
    pub dry_run: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
