// src/backend/git_cli.rs

//! `VcsBackend` implementation that drives the `git` executable.
//!
//! Every invocation runs through `tokio::process::Command` with
//! `kill_on_drop(true)` and is raced against the session's shutdown signal,
//! so closing a session interrupts a long clone or fetch instead of waiting
//! for it to finish.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::DateTime;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{BackendError, BackendFuture, Commit, Credential, HeadInfo, PullOutcome, VcsBackend};
use crate::shutdown::Shutdown;

/// Field separator used in `git log --format` output.
const FIELD_SEP: char = '\u{1f}';

/// Handle to a local clone managed by [`GitCliBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct GitCliBackend {
    program: PathBuf,
}

impl Default for GitCliBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCliBackend {
    /// Use `git` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn git(
        &self,
        dir: Option<&Path>,
        args: Vec<OsString>,
        credential: Option<&Credential>,
        shutdown: Option<&Shutdown>,
    ) -> Result<String, BackendError> {
        let description = describe(&args);

        if shutdown.is_some_and(|s| s.is_triggered()) {
            return Err(BackendError::Cancelled);
        }

        let mut cmd = Command::new(&self.program);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        apply_credential(&mut cmd, credential);
        cmd.args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(command = %description, ?dir, "running git");

        let output = match shutdown {
            Some(shutdown) => {
                tokio::select! {
                    out = cmd.output() => out,
                    _ = shutdown.wait() => {
                        debug!(command = %description, "git command interrupted by shutdown");
                        return Err(BackendError::Cancelled);
                    }
                }
            }
            None => cmd.output().await,
        }
        .map_err(|source| BackendError::Spawn {
            command: description.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(BackendError::CommandFailed {
                command: description,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn head_id(&self, repo: &GitRepo) -> Result<String, BackendError> {
        self.git(Some(&repo.path), os_args(["rev-parse", "HEAD"]), None, None)
            .await
    }

    async fn update_submodules(
        &self,
        repo: &GitRepo,
        credential: Option<&Credential>,
        shutdown: &Shutdown,
    ) -> Result<(), BackendError> {
        if !repo.path.join(".gitmodules").exists() {
            return Ok(());
        }
        self.git(
            Some(&repo.path),
            os_args(["submodule", "update", "--init", "--recursive"]),
            credential,
            Some(shutdown),
        )
        .await
        .map(|_| ())
    }
}

impl VcsBackend for GitCliBackend {
    type Handle = GitRepo;

    fn open<'a>(&'a self, path: &'a Path) -> BackendFuture<'a, Option<GitRepo>> {
        Box::pin(async move {
            let git_dir = path.join(".git");
            let exists = tokio::fs::try_exists(&git_dir)
                .await
                .map_err(|e| BackendError::Failed(format!("checking {git_dir:?}: {e}")))?;
            if !exists {
                return Ok(None);
            }
            Ok(Some(GitRepo {
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
    ) -> BackendFuture<'a, GitRepo> {
        Box::pin(async move {
            let mut args = os_args(["clone", "--branch", branch, "--recurse-submodules", "--"]);
            args.push(OsString::from(url));
            args.push(path.as_os_str().to_os_string());

            self.git(None, args, credential, Some(shutdown)).await?;

            Ok(GitRepo {
                path: path.to_path_buf(),
            })
        })
    }

    fn pull<'a>(
        &'a self,
        handle: &'a GitRepo,
        branch: &'a str,
        credential: Option<&'a Credential>,
        shutdown: &'a Shutdown,
    ) -> BackendFuture<'a, PullOutcome> {
        Box::pin(async move {
            let before = self.head_id(handle).await?;

            self.git(
                Some(&handle.path),
                os_args(["fetch", "--", "origin", branch]),
                credential,
                Some(shutdown),
            )
            .await?;

            // Diverged history fails here; the engine treats that as a broken
            // local copy.
            self.git(
                Some(&handle.path),
                os_args(["merge", "--ff-only", "FETCH_HEAD"]),
                None,
                Some(shutdown),
            )
            .await?;

            let after = self.head_id(handle).await?;
            if before == after {
                return Ok(PullOutcome::Unchanged);
            }

            self.update_submodules(handle, credential, shutdown).await?;
            debug!(path = ?handle.path, %before, %after, "fast-forwarded");
            Ok(PullOutcome::Changed)
        })
    }

    fn head_info<'a>(&'a self, handle: &'a GitRepo) -> BackendFuture<'a, HeadInfo> {
        Box::pin(async move {
            let remote_url = self
                .git(
                    Some(&handle.path),
                    os_args(["remote", "get-url", "origin"]),
                    None,
                    None,
                )
                .await?;

            let log = self
                .git(
                    Some(&handle.path),
                    os_args(["log", "-1", "--format=%H%x1f%an%x1f%ae%x1f%at%x1f%s"]),
                    None,
                    None,
                )
                .await?;

            let (commit, author_time) = parse_log_line(&log)?;

            Ok(HeadInfo {
                remote_url,
                root_path: handle.path.clone(),
                author_time,
                commit,
            })
        })
    }
}

fn parse_log_line(line: &str) -> Result<(Commit, DateTime<chrono::Utc>), BackendError> {
    let fields: Vec<&str> = line.splitn(5, FIELD_SEP).collect();
    let [id, author_name, author_email, seconds, summary] = fields.as_slice() else {
        return Err(BackendError::Parse(format!("malformed git log line: {line:?}")));
    };

    let seconds: i64 = seconds
        .parse()
        .map_err(|e| BackendError::Parse(format!("invalid author time '{seconds}': {e}")))?;
    let author_time = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| BackendError::Parse(format!("author time out of range: {seconds}")))?;

    Ok((
        Commit {
            id: id.to_string(),
            author_name: author_name.to_string(),
            author_email: author_email.to_string(),
            summary: summary.to_string(),
        },
        author_time,
    ))
}

fn apply_credential(cmd: &mut Command, credential: Option<&Credential>) {
    match credential {
        None | Some(Credential::SshAgent) => {}
        Some(Credential::SshKey(key)) => {
            let key = key.display().to_string().replace('\'', r"'\''");
            cmd.env(
                "GIT_SSH_COMMAND",
                format!("ssh -i '{key}' -o IdentitiesOnly=yes"),
            );
        }
        // Keep the header out of the process list.
        Some(Credential::HttpHeader(header)) => {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", header);
        }
    }
}

fn os_args<const N: usize>(args: [&str; N]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn describe(args: &[OsString]) -> String {
    let sub = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("git {sub}")
}
