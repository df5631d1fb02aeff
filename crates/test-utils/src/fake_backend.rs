use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SubsecRound, Utc};
use gitwatch::backend::{
    BackendError, BackendFuture, Commit, Credential, HeadInfo, PullOutcome, VcsBackend,
};
use gitwatch::shutdown::Shutdown;

/// One backend operation, as observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(PathBuf),
    Clone {
        url: String,
        path: PathBuf,
        branch: String,
        credential: Option<Credential>,
    },
    Pull {
        path: PathBuf,
        credential: Option<Credential>,
    },
    HeadInfo(PathBuf),
}

#[derive(Debug, Clone)]
struct FakeCommit {
    id: String,
    summary: String,
    time: DateTime<Utc>,
}

#[derive(Debug)]
struct LocalCopy {
    url: String,
    head: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    remotes: HashMap<String, Vec<FakeCommit>>,
    locals: HashMap<PathBuf, LocalCopy>,
    failing_clones: HashSet<String>,
    broken: HashSet<PathBuf>,
    hang_pulls: bool,
    calls: Vec<Call>,
}

/// Handle returned by [`FakeBackend::open`] / `clone_repo`.
#[derive(Debug, Clone)]
pub struct FakeHandle {
    path: PathBuf,
}

/// A `VcsBackend` that keeps remotes in memory.
///
/// - remotes are plain commit lists; the last entry is the branch head
/// - a clone creates the target directory on disk (so recovery has something
///   to delete) and records which remote commit it is at
/// - pulls fast-forward the local copy to the remote head
///
/// Failures are scripted per remote or per local path.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a remote with one initial commit and return its author time.
    pub fn add_remote(&self, url: &str) -> DateTime<Utc> {
        self.push_commit(url, "initial")
    }

    /// Add a commit to `url`'s branch (creating the remote if needed) and
    /// return its author time, truncated to whole seconds.
    pub fn push_commit(&self, url: &str, summary: &str) -> DateTime<Utc> {
        let time = Utc::now().trunc_subsecs(0);
        let mut state = self.state.lock().unwrap();
        let commits = state.remotes.entry(url.to_string()).or_default();
        commits.push(FakeCommit {
            id: format!("{url}@{}", commits.len()),
            summary: summary.to_string(),
            time,
        });
        time
    }

    /// Id of the commit `url`'s branch currently points at.
    pub fn remote_head(&self, url: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .remotes
            .get(url)
            .and_then(|c| c.last())
            .map(|c| c.id.clone())
    }

    /// Make every clone of `url` fail until [`FakeBackend::allow_clones`].
    pub fn fail_clones(&self, url: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_clones
            .insert(url.to_string());
    }

    pub fn allow_clones(&self, url: &str) {
        self.state.lock().unwrap().failing_clones.remove(url);
    }

    /// The next pull of the copy at `path` fails, like a diverged history.
    pub fn break_local(&self, path: &Path) {
        self.state
            .lock()
            .unwrap()
            .broken
            .insert(path.to_path_buf());
    }

    /// Make pulls block until the caller's shutdown signal fires.
    pub fn hang_pulls(&self, hang: bool) {
        self.state.lock().unwrap().hang_pulls = hang;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clone_count(&self, url: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Clone { url: u, .. } if u == url))
            .count()
    }

    pub fn pull_count(&self, path: &Path) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Pull { path: p, .. } if p == path))
            .count()
    }

    /// Commit id the local copy at `path` is at, if it exists.
    pub fn local_head(&self, path: &Path) -> Option<String> {
        let state = self.state.lock().unwrap();
        let local = state.locals.get(path)?;
        state
            .remotes
            .get(&local.url)
            .and_then(|c| c.get(local.head))
            .map(|c| c.id.clone())
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn clone_now(&self, url: &str, path: &Path) -> Result<FakeHandle, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_clones.contains(url) {
            return Err(BackendError::Failed(format!("remote {url} unreachable")));
        }
        let head = match state.remotes.get(url) {
            Some(commits) if !commits.is_empty() => commits.len() - 1,
            _ => return Err(BackendError::Failed(format!("repository {url} not found"))),
        };
        if path.exists() {
            return Err(BackendError::Failed(format!(
                "destination path {path:?} already exists"
            )));
        }
        std::fs::create_dir_all(path)
            .map_err(|e| BackendError::Failed(format!("creating {path:?}: {e}")))?;
        std::fs::write(path.join("HEAD"), url)
            .map_err(|e| BackendError::Failed(format!("writing into {path:?}: {e}")))?;

        state.broken.remove(path);
        state.locals.insert(
            path.to_path_buf(),
            LocalCopy {
                url: url.to_string(),
                head,
            },
        );
        Ok(FakeHandle {
            path: path.to_path_buf(),
        })
    }

    fn pull_now(&self, path: &Path) -> Result<PullOutcome, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.broken.remove(path) {
            return Err(BackendError::Failed(
                "non-fast-forward update".to_string(),
            ));
        }
        let url = match state.locals.get(path) {
            Some(local) => local.url.clone(),
            None => return Err(BackendError::Failed(format!("no local copy at {path:?}"))),
        };
        let latest = state
            .remotes
            .get(&url)
            .map(|c| c.len().saturating_sub(1))
            .unwrap_or_default();

        let local = state
            .locals
            .get_mut(path)
            .ok_or_else(|| BackendError::Failed(format!("no local copy at {path:?}")))?;
        if local.head == latest {
            return Ok(PullOutcome::Unchanged);
        }
        local.head = latest;
        Ok(PullOutcome::Changed)
    }

    fn head_now(&self, path: &Path) -> Result<HeadInfo, BackendError> {
        let state = self.state.lock().unwrap();
        let local = state
            .locals
            .get(path)
            .ok_or_else(|| BackendError::Failed(format!("no local copy at {path:?}")))?;
        let commit = state
            .remotes
            .get(&local.url)
            .and_then(|c| c.get(local.head))
            .ok_or_else(|| BackendError::Failed("dangling head".to_string()))?;

        Ok(HeadInfo {
            remote_url: local.url.clone(),
            root_path: path.to_path_buf(),
            author_time: commit.time,
            commit: Commit {
                id: commit.id.clone(),
                author_name: "test".to_string(),
                author_email: "test@test.com".to_string(),
                summary: commit.summary.clone(),
            },
        })
    }
}

impl VcsBackend for FakeBackend {
    type Handle = FakeHandle;

    fn open<'a>(&'a self, path: &'a Path) -> BackendFuture<'a, Option<FakeHandle>> {
        Box::pin(async move {
            self.record(Call::Open(path.to_path_buf()));
            let mut state = self.state.lock().unwrap();
            if !path.exists() {
                state.locals.remove(path);
                return Ok(None);
            }
            Ok(state.locals.contains_key(path).then(|| FakeHandle {
                path: path.to_path_buf(),
            }))
        })
    }

    fn clone_repo<'a>(
        &'a self,
        url: &'a str,
        path: &'a Path,
        branch: &'a str,
        credential: Option<&'a Credential>,
        shutdown: &'a Shutdown,
    ) -> BackendFuture<'a, FakeHandle> {
        Box::pin(async move {
            self.record(Call::Clone {
                url: url.to_string(),
                path: path.to_path_buf(),
                branch: branch.to_string(),
                credential: credential.cloned(),
            });
            if shutdown.is_triggered() {
                return Err(BackendError::Cancelled);
            }
            self.clone_now(url, path)
        })
    }

    fn pull<'a>(
        &'a self,
        handle: &'a FakeHandle,
        _branch: &'a str,
        credential: Option<&'a Credential>,
        shutdown: &'a Shutdown,
    ) -> BackendFuture<'a, PullOutcome> {
        Box::pin(async move {
            self.record(Call::Pull {
                path: handle.path.clone(),
                credential: credential.cloned(),
            });
            let hang = self.state.lock().unwrap().hang_pulls;
            if hang {
                shutdown.wait().await;
            }
            if shutdown.is_triggered() {
                return Err(BackendError::Cancelled);
            }
            self.pull_now(&handle.path)
        })
    }

    fn head_info<'a>(&'a self, handle: &'a FakeHandle) -> BackendFuture<'a, HeadInfo> {
        Box::pin(async move {
            self.record(Call::HeadInfo(handle.path.clone()));
            self.head_now(&handle.path)
        })
    }
}
