// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum GitwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("failed to open local repository at {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("failed to clone repository {url}")]
    Clone {
        url: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to pull repository {url}")]
    Pull {
        url: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to read head commit of {path:?}")]
    HeadInfo {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("failed to remove {path:?} for re-clone")]
    RecoveryCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch session cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GitwatchError {
    /// True for the terminal cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GitwatchError::Cancelled)
    }

    /// Wrap a clone failure, keeping cancellation distinct from real failures.
    pub(crate) fn clone_failed(url: &str, source: BackendError) -> Self {
        match source {
            BackendError::Cancelled => GitwatchError::Cancelled,
            source => GitwatchError::Clone {
                url: url.to_string(),
                source,
            },
        }
    }

    pub(crate) fn pull_failed(url: &str, source: BackendError) -> Self {
        match source {
            BackendError::Cancelled => GitwatchError::Cancelled,
            source => GitwatchError::Pull {
                url: url.to_string(),
                source,
            },
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GitwatchError>;
