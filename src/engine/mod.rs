// src/engine/mod.rs

//! Scheduling and recovery engine for gitwatch.
//!
//! This module ties together:
//! - the per-repository check (open / clone / pull / read head)
//! - the re-clone recovery policy for broken local copies
//! - event and error delivery to the session's consumers
//! - the main scheduler loop that reacts to:
//!   - timer ticks
//!   - cancellation
//!   - repositories registered while running
//!
//! The pure state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::backend::{Commit, HeadInfo};

/// A change observed on one watched repository.
///
/// One event is produced per detected change per repository per pass; it is
/// consumed once by whoever receives it and never replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    url: String,
    path: PathBuf,
    timestamp: DateTime<Utc>,
    commit: Commit,
}

impl Event {
    /// Remote the local copy tracks.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Absolute path of the local copy.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Author time of the head commit, second precision.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }
}

impl From<HeadInfo> for Event {
    fn from(info: HeadInfo) -> Self {
        Self {
            url: info.remote_url,
            path: info.root_path,
            timestamp: info.author_time,
            commit: info.commit,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.url,
            self.path.display(),
            self.timestamp.to_rfc3339(),
            self.commit.id
        )
    }
}

pub mod check;
pub mod core;
pub mod dispatcher;
pub mod recovery;
pub mod runtime;

pub use check::{check_repository, CheckContext};
pub use core::{CoreCommand, CoreStep, PassKind, SchedulerCore, SchedulerEvent, SessionState};
pub use dispatcher::EventDispatcher;
pub use crate::types::{FailurePolicy, RecoveryPolicy};
pub use runtime::{Scheduler, SchedulerSettings};
