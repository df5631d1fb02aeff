// src/logging.rs

//! Logging for `gitwatch` through `tracing-subscriber` with an `EnvFilter`.
//!
//! The filter comes from, in order:
//! 1. `--log-level`, applied to gitwatch's own targets
//! 2. `GITWATCH_LOG`: a bare level is scoped like `--log-level`; anything else
//!    is used verbatim as `EnvFilter` directives (e.g. `gitwatch::engine=trace`)
//! 3. `info` for gitwatch
//!
//! Dependencies log at `warn` unless the directives say otherwise. Output goes
//! to stderr; stdout carries nothing but events.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable read when `--log-level` is absent.
pub const LOG_ENV: &str = "GITWATCH_LOG";

/// Initialise the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let directives = filter_directives(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?} (from {LOG_ENV})"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    Ok(())
}

/// `EnvFilter` directives for the given flag and `GITWATCH_LOG` value.
pub fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return scoped(level_from_log_level(lvl));
    }
    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => match parse_level_str(value) {
            Some(level) => scoped(level),
            None => value.to_string(),
        },
        None => scoped(Level::INFO),
    }
}

fn scoped(level: Level) -> String {
    format!("warn,gitwatch={}", level.as_str().to_ascii_lowercase())
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
