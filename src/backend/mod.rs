// src/backend/mod.rs

//! Pluggable version-control backend abstraction.
//!
//! The scheduler talks to a `VcsBackend` instead of a concrete git library.
//! It only needs four primitives (open, clone, pull, read head) and does not
//! care whether they are served by a subprocess, a library or a fake.
//!
//! - [`git_cli`] provides [`GitCliBackend`], which shells out to `git`.
//! - Tests provide their own `VcsBackend` that scripts remote state in memory.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::shutdown::Shutdown;

pub mod git_cli;

pub use git_cli::GitCliBackend;

/// Boxed future returned by every backend operation.
pub type BackendFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Failures reported by a backend. The engine wraps these with the failing
/// operation's context before they reach the caller.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("unexpected backend output: {0}")]
    Parse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// Authentication handed through to the backend untouched.
///
/// The scheduler never inspects this value; it only picks the repository's
/// own credential over the session default.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Use whatever the ambient SSH agent offers.
    SshAgent,
    /// Use a specific private key file.
    SshKey(PathBuf),
    /// Extra HTTP header sent with every request, e.g. `Authorization: Bearer ...`.
    HttpHeader(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SshAgent => f.write_str("SshAgent"),
            Credential::SshKey(path) => f.debug_tuple("SshKey").field(path).finish(),
            Credential::HttpHeader(_) => f.write_str("HttpHeader(<redacted>)"),
        }
    }
}

/// Result of synchronising a local copy with its remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The branch moved; the local head now points at new commits.
    Changed,
    /// Already up to date.
    Unchanged,
}

/// Metadata of the commit a repository's head points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub summary: String,
}

/// Everything the engine needs to build an `Event` for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    pub remote_url: String,
    pub root_path: PathBuf,
    pub author_time: DateTime<Utc>,
    pub commit: Commit,
}

/// Trait abstracting the repository operations the scheduler relies on.
///
/// `clone_repo` and `pull` receive the session's [`Shutdown`] signal and are
/// expected to return [`BackendError::Cancelled`] promptly once it fires.
pub trait VcsBackend: Send + Sync {
    /// Handle to an opened local repository.
    type Handle: Send + Sync;

    /// Open an existing local copy. `Ok(None)` means nothing exists there yet.
    fn open<'a>(&'a self, path: &'a Path) -> BackendFuture<'a, Option<Self::Handle>>;

    fn clone_repo<'a>(
        &'a self,
        url: &'a str,
        path: &'a Path,
        branch: &'a str,
        credential: Option<&'a Credential>,
        shutdown: &'a Shutdown,
    ) -> BackendFuture<'a, Self::Handle>;

    fn pull<'a>(
        &'a self,
        handle: &'a Self::Handle,
        branch: &'a str,
        credential: Option<&'a Credential>,
        shutdown: &'a Shutdown,
    ) -> BackendFuture<'a, PullOutcome>;

    fn head_info<'a>(&'a self, handle: &'a Self::Handle) -> BackendFuture<'a, HeadInfo>;
}
