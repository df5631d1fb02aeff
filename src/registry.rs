// src/registry.rs

//! Watch targets and their local storage paths.
//!
//! A [`Repository`] is what a caller configures. Registering it with a
//! [`RepositoryRegistry`] "hydrates" it into a [`WatchTarget`], which carries
//! the absolute local path computed exactly once from the session's root
//! directory. Targets are never re-hydrated afterwards.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::backend::Credential;
use crate::errors::{GitwatchError, Result};

/// Branch used when a repository does not name one.
pub const DEFAULT_BRANCH: &str = "master";

/// A repository to watch, as configured by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Local or remote source location.
    pub url: String,
    pub branch: String,
    /// Folder name under the session root; derived from `url` when `None`.
    pub directory: Option<String>,
    /// Overrides the session's default credential when set.
    pub credential: Option<Credential>,
}

impl Repository {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: DEFAULT_BRANCH.to_string(),
            directory: None,
            credential: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// Parses the `url` / `url#branch` shorthand.
///
/// Splits on the first `#`; a missing or empty branch means
/// [`DEFAULT_BRANCH`].
impl FromStr for Repository {
    type Err = GitwatchError;

    fn from_str(s: &str) -> Result<Self> {
        let (url, branch) = match s.split_once('#') {
            Some((url, branch)) => (url, branch),
            None => (s, ""),
        };

        if url.trim().is_empty() {
            return Err(GitwatchError::ConfigError(format!(
                "repository '{s}' has an empty url"
            )));
        }

        let repo = Repository::new(url);
        if branch.is_empty() {
            return Ok(repo);
        }
        validate_branch(branch)?;
        Ok(repo.with_branch(branch))
    }
}

/// A hydrated repository: configuration plus its resolved local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    repository: Repository,
    path: PathBuf,
}

impl WatchTarget {
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn url(&self) -> &str {
        &self.repository.url
    }

    pub fn branch(&self) -> &str {
        &self.repository.branch
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.repository.credential.as_ref()
    }

    /// Absolute local storage path, fixed at hydration time.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Derive the local path of `repo` under `root`.
///
/// The result is always absolute; a relative `root` is resolved against the
/// current working directory.
pub fn hydrate(root: &Path, repo: Repository) -> Result<WatchTarget> {
    validate_branch(&repo.branch)?;
    let directory = match &repo.directory {
        Some(dir) if !dir.trim().is_empty() => dir.clone(),
        _ => repo_directory(&repo.url)?,
    };

    let path = std::path::absolute(root.join(&directory))?;

    Ok(WatchTarget {
        repository: repo,
        path,
    })
}

/// Reject branch names git would not accept as `refs/heads/<branch>`.
///
/// Follows the rules of `git check-ref-format --branch`. A leading `-` is
/// refused as well, since the name is handed to git on its command line.
pub fn validate_branch(branch: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(GitwatchError::ConfigError(format!(
            "invalid branch name {branch:?}: {reason}"
        )))
    };

    if branch.is_empty() {
        return invalid("empty");
    }
    if branch.starts_with('-') {
        return invalid("starts with '-'");
    }
    if branch == "@" {
        return invalid("'@' is not a branch");
    }
    if let Some(c) = branch
        .chars()
        .find(|c| c.is_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return invalid(&format!("contains {c:?}"));
    }
    if branch.contains("..") || branch.contains("@{") || branch.contains("//") {
        return invalid("contains '..', '@{' or '//'");
    }
    if branch.starts_with('/') || branch.ends_with('/') || branch.ends_with('.') {
        return invalid("starts with '/' or ends with '/' or '.'");
    }
    if branch
        .split('/')
        .any(|part| part.starts_with('.') || part.ends_with(".lock"))
    {
        return invalid("a component starts with '.' or ends with '.lock'");
    }
    Ok(())
}

/// Directory name a repository is cloned into when none is configured.
///
/// - `http://` / `https://` URLs use the last segment of the URL path.
/// - Anything else is treated as `[user@]host:path` or a plain filesystem
///   path: everything after the first `:` (or the whole string when there is
///   none) is read as a path and its last segment is used.
pub fn repo_directory(url: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(GitwatchError::ConfigError("empty repository url".to_string()));
    }
    if let Some(c) = url.chars().find(|c| c.is_control()) {
        return Err(GitwatchError::ConfigError(format!(
            "invalid control character {c:?} in repository url {url:?}"
        )));
    }

    let path = match http_path(url) {
        Some(path) => path,
        None => match url.split_once(':') {
            Some((_host, rest)) => rest,
            None => url,
        },
    };

    last_segment(strip_suffixes(path)).ok_or_else(|| {
        GitwatchError::ConfigError(format!("cannot derive a directory name from '{url}'"))
    })
}

/// Path component of an `http`/`https` URL, without the authority.
fn http_path(url: &str) -> Option<&str> {
    let (scheme, rest) = url.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }
    Some(rest.find('/').map_or("", |idx| &rest[idx..]))
}

/// Drop `?query` and `#fragment` parts.
fn strip_suffixes(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn last_segment(path: &str) -> Option<String> {
    path.split(['/', '\\'])
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .last()
        .map(str::to_string)
}

/// The ordered list of watch targets owned by a session.
///
/// Mutated only by whoever owns the session: the constructing caller before
/// `run`, the scheduler task afterwards.
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    root: PathBuf,
    targets: Vec<WatchTarget>,
}

impl RepositoryRegistry {
    /// Hydrate every repository under `root`. Fails on the first bad locator.
    pub fn new(root: impl Into<PathBuf>, repositories: Vec<Repository>) -> Result<Self> {
        let root = root.into();
        let targets = repositories
            .into_iter()
            .map(|repo| hydrate(&root, repo))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { root, targets })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hydrate and append one repository.
    pub fn register(&mut self, repository: Repository) -> Result<&WatchTarget> {
        let target = hydrate(&self.root, repository)?;
        Ok(self.push(target))
    }

    /// Append an already hydrated target.
    pub fn push(&mut self, target: WatchTarget) -> &WatchTarget {
        self.targets.push(target);
        &self.targets[self.targets.len() - 1]
    }

    pub fn targets(&self) -> &[WatchTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
