#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use gitwatch::config::{ConfigFile, RawConfigFile, RepositoryConfig, WatchSection};
use gitwatch::types::{FailurePolicy, RecoveryPolicy};
use gitwatch::{Repository, SessionConfig};

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                watch: WatchSection::default(),
                repository: Vec::new(),
            },
        }
    }

    pub fn with_repository(mut self, repo: RepositoryConfig) -> Self {
        self.config.repository.push(repo);
        self
    }

    pub fn with_interval(mut self, interval: &str) -> Self {
        self.config.watch.interval = interval.to_string();
        self
    }

    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watch.directory = dir.into();
        self
    }

    pub fn with_initial_event(mut self, val: bool) -> Self {
        self.config.watch.initial_event = val;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.watch.failure_policy = policy;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.config.watch.event_capacity = Some(capacity);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RepositoryConfig`.
pub struct RepositoryConfigBuilder {
    repo: RepositoryConfig,
}

impl RepositoryConfigBuilder {
    pub fn new(url: &str) -> Self {
        Self {
            repo: RepositoryConfig {
                url: url.to_string(),
                branch: None,
                directory: None,
                ssh_key: None,
                http_header: None,
            },
        }
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.repo.branch = Some(branch.to_string());
        self
    }

    pub fn directory(mut self, dir: &str) -> Self {
        self.repo.directory = Some(dir.to_string());
        self
    }

    pub fn ssh_key(mut self, key: impl Into<PathBuf>) -> Self {
        self.repo.ssh_key = Some(key.into());
        self
    }

    pub fn http_header(mut self, header: &str) -> Self {
        self.repo.http_header = Some(header.to_string());
        self
    }

    pub fn build(self) -> RepositoryConfig {
        self.repo
    }
}

/// Session settings tuned for tests: short interval, isolate failures,
/// re-clone on broken copies.
pub fn fast_session(root: &Path, urls: &[&str]) -> SessionConfig {
    let repositories = urls.iter().map(|url| Repository::new(*url)).collect();
    SessionConfig::new(repositories, Duration::from_millis(20), root)
        .with_failure_policy(FailurePolicy::Isolate)
        .with_recovery(RecoveryPolicy::Reclone)
}
