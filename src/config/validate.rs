// src/config/validate.rs

use std::collections::HashMap;
use std::time::Duration;

use crate::config::model::{parse_duration, ConfigFile, RawConfigFile, RepositoryConfig};
use crate::errors::{GitwatchError, Result};
use crate::registry::{repo_directory, validate_branch};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = GitwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let interval = validate_raw_config(&raw)?;
        let repositories = raw
            .repository
            .iter()
            .map(RepositoryConfig::to_repository)
            .collect();
        Ok(ConfigFile::new_unchecked(raw.watch, interval, repositories))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<Duration> {
    ensure_has_repositories(cfg)?;
    let interval = validate_watch_section(cfg)?;
    validate_repositories(cfg)?;
    Ok(interval)
}

fn ensure_has_repositories(cfg: &RawConfigFile) -> Result<()> {
    if cfg.repository.is_empty() {
        return Err(GitwatchError::ConfigError(
            "no repositories to watch: pass at least one URL or a [[repository]] entry"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<Duration> {
    let interval = parse_duration(&cfg.watch.interval)
        .map_err(|e| GitwatchError::ConfigError(format!("[watch].interval: {e}")))?;

    if interval.is_zero() {
        return Err(GitwatchError::ConfigError(
            "[watch].interval must be greater than zero".to_string(),
        ));
    }

    if cfg.watch.error_capacity == 0 {
        return Err(GitwatchError::ConfigError(
            "[watch].error_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.watch.event_capacity == Some(0) {
        return Err(GitwatchError::ConfigError(
            "[watch].event_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(interval)
}

fn validate_repositories(cfg: &RawConfigFile) -> Result<()> {
    // Two repositories resolving to the same folder would clobber each other.
    let mut seen: HashMap<String, &str> = HashMap::new();

    for repo in cfg.repository.iter() {
        let url = repo.url.trim();
        let directory = match repo.directory.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => dir.to_string(),
            _ => repo_directory(url)?,
        };

        if let Some(branch) = repo.branch.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            validate_branch(branch)?;
        }

        if repo.ssh_key.is_some() && repo.http_header.is_some() {
            return Err(GitwatchError::ConfigError(format!(
                "repository '{url}' sets both ssh_key and http_header"
            )));
        }

        if let Some(other) = seen.insert(directory.clone(), url) {
            return Err(GitwatchError::ConfigError(format!(
                "repositories '{other}' and '{url}' both map to directory '{directory}'; set `directory` on one of them"
            )));
        }
    }
    Ok(())
}
