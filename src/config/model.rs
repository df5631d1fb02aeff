// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::Credential;
use crate::registry::Repository;
use crate::session::{SessionConfig, DEFAULT_ERROR_CAPACITY};
use crate::types::{FailurePolicy, RecoveryPolicy};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// interval = "30s"
/// directory = "gitwatch"
/// initial_event = true
///
/// [[repository]]
/// url = "git@github.com:user/repo"
/// branch = "main"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    /// All `[[repository]]` entries, in check order.
    #[serde(default)]
    pub repository: Vec<RepositoryConfig>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Duration string such as `"100ms"`, `"30s"`, `"5m"`.
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Root directory for local copies.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    #[serde(default)]
    pub initial_event: bool,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub recovery: RecoveryPolicy,

    /// If `None`, the event channel is sized to the repository count.
    #[serde(default)]
    pub event_capacity: Option<usize>,

    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,

    /// Default SSH key; the SSH agent is used when unset.
    #[serde(default)]
    pub ssh_key: Option<PathBuf>,
}

fn default_interval() -> String {
    "100ms".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from("gitwatch")
}

fn default_error_capacity() -> usize {
    DEFAULT_ERROR_CAPACITY
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            directory: default_directory(),
            initial_event: false,
            failure_policy: FailurePolicy::default(),
            recovery: RecoveryPolicy::default(),
            event_capacity: None,
            error_capacity: default_error_capacity(),
            ssh_key: None,
        }
    }
}

/// `[[repository]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub url: String,

    /// Defaults to `master`.
    #[serde(default)]
    pub branch: Option<String>,

    /// Folder name under `watch.directory`; derived from `url` when unset.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default)]
    pub ssh_key: Option<PathBuf>,

    /// Raw HTTP header, e.g. `"Authorization: Bearer <token>"`.
    #[serde(default)]
    pub http_header: Option<String>,
}

impl RepositoryConfig {
    pub fn credential(&self) -> Option<Credential> {
        if let Some(header) = &self.http_header {
            return Some(Credential::HttpHeader(header.clone()));
        }
        self.ssh_key.clone().map(Credential::SshKey)
    }

    pub fn to_repository(&self) -> Repository {
        let mut repo = Repository::new(self.url.trim());
        if let Some(branch) = self.branch.as_deref().filter(|b| !b.trim().is_empty()) {
            repo = repo.with_branch(branch.trim());
        }
        if let Some(dir) = &self.directory {
            repo = repo.with_directory(dir.clone());
        }
        if let Some(credential) = self.credential() {
            repo = repo.with_credential(credential);
        }
        repo
    }
}

impl From<Repository> for RepositoryConfig {
    fn from(repo: Repository) -> Self {
        Self {
            url: repo.url,
            branch: Some(repo.branch),
            directory: repo.directory,
            ssh_key: None,
            http_header: None,
        }
    }
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub interval: Duration,
    pub repositories: Vec<Repository>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        watch: WatchSection,
        interval: Duration,
        repositories: Vec<Repository>,
    ) -> Self {
        Self {
            watch,
            interval,
            repositories,
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(
            self.repositories.clone(),
            self.interval,
            self.watch.directory.clone(),
        )
        .with_initial_event(self.watch.initial_event)
        .with_failure_policy(self.watch.failure_policy)
        .with_recovery(self.watch.recovery);

        config.event_capacity = self.watch.event_capacity;
        config.error_capacity = self.watch.error_capacity;
        if let Some(key) = &self.watch.ssh_key {
            config = config.with_credential(Credential::SshKey(key.clone()));
        }
        config
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
