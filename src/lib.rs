// src/lib.rs

//! Watch a set of git repositories for new commits.
//!
//! Repositories are cloned into a local directory once, then checked on a
//! fixed interval; every new head shows up as an [`Event`]. Local copies that
//! can no longer be pulled are discarded and cloned again.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod types;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub use crate::backend::{Credential, GitCliBackend, VcsBackend};
pub use crate::engine::Event;
pub use crate::registry::{Repository, WatchTarget};
pub use crate::session::{Session, SessionConfig, SessionHandle, SessionOutputs};
pub use crate::shutdown::Shutdown;

use crate::cli::CliArgs;
use crate::config::{ConfigFile, RawConfigFile, RepositoryConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config file + command-line resolution
/// - the git CLI backend
/// - the watch session
/// - a consumer printing events and errors to stdout
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    info!(
        interval = ?cfg.interval,
        dir = ?cfg.watch.directory,
        initial_event = cfg.watch.initial_event,
        "starting gitwatch"
    );

    let shutdown = Shutdown::new();
    let mut session = Session::new(&shutdown, cfg.to_session_config(), GitCliBackend::new())
        .context("failed to initialise watcher")?;

    let outputs = session
        .take_outputs()
        .context("session outputs already taken")?;
    tokio::spawn(print_outputs(outputs));

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            shutdown.trigger();
        });
    }

    match session.run().await {
        Err(err) if err.is_cancelled() => {
            debug!("session cancelled; exiting");
            Ok(())
        }
        Err(err) => Err(err.into()),
        Ok(()) => Ok(()),
    }
}

/// Merge the optional config file with command-line values.
///
/// Without `--config`, `Gitwatch.toml` in the working directory is used when
/// it exists.
///
/// Command-line flags override `[watch]` settings; positional repositories
/// are appended after the file's `[[repository]]` entries.
pub fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(config::default_config_path()).filter(|p| p.is_file()),
    };
    let mut raw = match &path {
        Some(path) => config::load_from_path(path)
            .with_context(|| format!("loading config file {path:?}"))?,
        None => RawConfigFile::default(),
    };

    if let Some(interval) = &args.interval {
        raw.watch.interval = interval.clone();
    }
    if let Some(dir) = &args.dir {
        raw.watch.directory = dir.clone();
    }
    if args.initial_event {
        raw.watch.initial_event = true;
    }
    if let Some(key) = &args.ssh_key {
        raw.watch.ssh_key = Some(key.clone());
    }

    for entry in &args.repositories {
        let repo: Repository = entry.parse()?;
        raw.repository.push(RepositoryConfig::from(repo));
    }

    Ok(ConfigFile::try_from(raw)?)
}

async fn print_outputs(mut outputs: SessionOutputs) {
    let mut events_open = true;
    let mut errors_open = true;

    while events_open || errors_open {
        tokio::select! {
            event = outputs.events.recv(), if events_open => match event {
                Some(event) => println!("Event: {event}"),
                None => events_open = false,
            },
            error = outputs.errors.recv(), if errors_open => match error {
                Some(error) => {
                    warn!(error = %error, "repository error");
                    println!("Error: {error:#}");
                }
                None => errors_open = false,
            },
        }
    }
}

/// Simple dry-run output: print the resolved settings and targets.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let session = cfg.to_session_config();
    let registry = registry::RepositoryRegistry::new(&session.directory, session.repositories)?;

    println!("gitwatch dry-run");
    println!("  interval = {:?}", cfg.interval);
    println!("  directory = {}", cfg.watch.directory.display());
    println!("  initial_event = {}", cfg.watch.initial_event);
    println!("  failure_policy = {:?}", cfg.watch.failure_policy);
    println!("  recovery = {:?}", cfg.watch.recovery);
    println!();

    println!("repositories ({}):", registry.len());
    for target in registry.targets() {
        println!("  - {}", target.url());
        println!("      branch: {}", target.branch());
        println!("      path: {}", target.path().display());
        if let Some(credential) = target.credential() {
            println!("      credential: {credential:?}");
        }
    }

    debug!("dry-run complete (nothing cloned)");
    Ok(())
}
