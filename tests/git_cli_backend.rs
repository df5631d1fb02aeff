// tests/git_cli_backend.rs
//
// Runs the real `git` binary against repositories in temporary directories.
// Every test returns early when `git` is not installed.

mod common;
use crate::common::{finish, init_tracing, recv_within, with_timeout};

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use gitwatch::backend::{BackendError, PullOutcome, VcsBackend};
use gitwatch::errors::GitwatchError;
use gitwatch::{Credential, GitCliBackend, Repository, Session, SessionConfig, Shutdown};

type TestResult = Result<(), Box<dyn Error>>;

const AUTHOR_DATE: &str = "2024-01-02T03:04:05Z";

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

fn git(dir: &Path, args: &[&str]) -> Result<String, Box<dyn Error>> {
    let out = Command::new("git")
        .args([
            "-c",
            "user.name=Gitwatch Test",
            "-c",
            "user.email=test@gitwatch.dev",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_DATE", AUTHOR_DATE)
        .env("GIT_COMMITTER_DATE", AUTHOR_DATE)
        .output()?;
    if !out.status.success() {
        return Err(format!(
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// A non-bare upstream repository on `master` with one commit.
fn upstream(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join("upstream").join("alpha");
    std::fs::create_dir_all(&path)?;
    git(&path, &["init", "-q"])?;
    git(&path, &["symbolic-ref", "HEAD", "refs/heads/master"])?;
    commit(&path, "initial")?;
    Ok(path)
}

fn commit(repo: &Path, message: &str) -> Result<String, Box<dyn Error>> {
    git(repo, &["commit", "-q", "--allow-empty", "-m", message])?;
    git(repo, &["rev-parse", "HEAD"])
}

fn url_of(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn clone_pull_and_head_info() -> TestResult {
    if !git_available() {
        eprintln!("git not found; skipping");
        return Ok(());
    }
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    let local = tmp.path().join("watch").join("alpha");
    let backend = GitCliBackend::new();
    let shutdown = Shutdown::new();

    assert!(backend.open(&local).await?.is_none());

    let repo = backend
        .clone_repo(&url_of(&remote), &local, "master", None, &shutdown)
        .await?;
    assert_eq!(repo.path(), local);
    assert!(backend.open(&local).await?.is_some());

    let info = backend.head_info(&repo).await?;
    assert_eq!(info.remote_url, url_of(&remote));
    assert_eq!(info.root_path, local);
    assert_eq!(info.commit.id, git(&remote, &["rev-parse", "HEAD"])?);
    assert_eq!(info.commit.summary, "initial");
    assert_eq!(info.commit.author_name, "Gitwatch Test");
    assert_eq!(
        info.author_time,
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    );

    let outcome = backend.pull(&repo, "master", None, &shutdown).await?;
    assert_eq!(outcome, PullOutcome::Unchanged);

    let new_head = commit(&remote, "second")?;
    let outcome = backend.pull(&repo, "master", None, &shutdown).await?;
    assert_eq!(outcome, PullOutcome::Changed);
    assert_eq!(backend.head_info(&repo).await?.commit.id, new_head);
    Ok(())
}

#[tokio::test]
async fn clone_of_missing_branch_fails() -> TestResult {
    if !git_available() {
        return Ok(());
    }
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    let backend = GitCliBackend::new();

    let err = backend
        .clone_repo(
            &url_of(&remote),
            &tmp.path().join("watch").join("alpha"),
            "no-such-branch",
            None,
            &Shutdown::new(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, BackendError::CommandFailed { ref command, .. } if command == "git clone"),
        "got {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn diverged_history_fails_the_pull() -> TestResult {
    if !git_available() {
        return Ok(());
    }
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    commit(&remote, "second")?;
    let local = tmp.path().join("watch").join("alpha");
    let backend = GitCliBackend::new();
    let shutdown = Shutdown::new();

    let repo = backend
        .clone_repo(&url_of(&remote), &local, "master", None, &shutdown)
        .await?;

    git(&remote, &["reset", "-q", "--hard", "HEAD~1"])?;
    commit(&remote, "rewritten")?;

    let err = backend
        .pull(&repo, "master", None, &shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::CommandFailed { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn option_like_branch_is_not_read_as_a_fetch_option() -> TestResult {
    if !git_available() {
        return Ok(());
    }
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    let local = tmp.path().join("watch").join("alpha");
    let marker = tmp.path().join("upload-pack-ran");
    let backend = GitCliBackend::new();
    let shutdown = Shutdown::new();

    let repo = backend
        .clone_repo(&url_of(&remote), &local, "master", None, &shutdown)
        .await?;

    let branch = format!("--upload-pack=touch {}; git-upload-pack", marker.display());
    let result = backend.pull(&repo, &branch, None, &shutdown).await;

    assert!(
        matches!(result, Err(BackendError::CommandFailed { ref command, .. }) if command == "git fetch"),
        "got {result:?}"
    );
    assert!(!marker.exists(), "branch name was run as a command");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn http_header_is_not_passed_on_the_command_line() -> TestResult {
    use std::os::unix::fs::PermissionsExt;

    if !git_available() {
        return Ok(());
    }
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    let record = tmp.path().join("record");
    std::fs::create_dir_all(&record)?;

    let wrapper = tmp.path().join("git-wrapper");
    std::fs::write(
        &wrapper,
        format!(
            "#!/bin/sh\n\
             printf '%s\\n' \"$@\" >> '{dir}/args'\n\
             printf '%s=%s\\n' \"$GIT_CONFIG_KEY_0\" \"$GIT_CONFIG_VALUE_0\" >> '{dir}/env'\n\
             exec git \"$@\"\n",
            dir = record.display()
        ),
    )?;
    std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755))?;

    let credential = Credential::HttpHeader("Authorization: Bearer s3cr3t".to_string());
    GitCliBackend::with_program(&wrapper)
        .clone_repo(
            &url_of(&remote),
            &tmp.path().join("watch").join("alpha"),
            "master",
            Some(&credential),
            &Shutdown::new(),
        )
        .await?;

    let args = std::fs::read_to_string(record.join("args"))?;
    let env = std::fs::read_to_string(record.join("env"))?;
    assert!(!args.contains("s3cr3t"), "header leaked into argv: {args}");
    assert!(
        env.contains("http.extraHeader=Authorization: Bearer s3cr3t"),
        "got {env}"
    );
    Ok(())
}

#[tokio::test]
async fn triggered_shutdown_cancels_before_spawning() -> TestResult {
    if !git_available() {
        return Ok(());
    }
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    let shutdown = Shutdown::new();
    shutdown.trigger();

    let err = GitCliBackend::new()
        .clone_repo(
            &url_of(&remote),
            &tmp.path().join("watch").join("alpha"),
            "master",
            None,
            &shutdown,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Cancelled));
    Ok(())
}

#[tokio::test]
async fn missing_executable_is_a_spawn_error() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let err = GitCliBackend::with_program("/nonexistent/git-binary")
        .clone_repo(
            "https://example.com/repo",
            &tmp.path().join("repo"),
            "master",
            None,
            &Shutdown::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Spawn { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn session_over_real_git_reports_commits_and_recovers() -> TestResult {
    if !git_available() {
        return Ok(());
    }
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let remote = upstream(tmp.path())?;
    let root = tmp.path().join("watch");
    let shutdown = Shutdown::new();

    let config = SessionConfig::new(
        vec![Repository::new(url_of(&remote))],
        Duration::from_millis(50),
        &root,
    );
    let mut session = Session::new(&shutdown, config, GitCliBackend::new())?;
    let mut outputs = session.take_outputs().expect("outputs");
    let handle = session.handle();
    let task = tokio::spawn(session.run());

    with_timeout(&mut outputs.initial_done).await?;
    assert!(root.join("alpha").join(".git").is_dir());

    // Fast-forward.
    let head = commit(&remote, "feature")?;
    let event = recv_within(&mut outputs.events).await;
    assert_eq!(event.commit().id, head);
    assert_eq!(event.url(), url_of(&remote));
    assert_eq!(event.path(), root.join("alpha"));

    // Rewritten history: the local copy is discarded and cloned again.
    git(&remote, &["reset", "-q", "--hard", "HEAD~1"])?;
    let rewritten = commit(&remote, "rewritten")?;
    let event = recv_within(&mut outputs.events).await;
    assert_eq!(event.commit().id, rewritten);
    assert_eq!(event.commit().summary, "rewritten");

    handle.close();
    let outcome = finish(task).await;
    assert!(matches!(outcome, Err(GitwatchError::Cancelled)));
    Ok(())
}
