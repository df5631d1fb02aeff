// tests/session_recovery.rs

mod common;
use crate::common::builders::fast_session;
use crate::common::{
    assert_quiet, finish, init_tracing, recv_within, spawn_session, with_timeout, FakeBackend,
};

use std::error::Error;
use std::time::Duration;

use gitwatch::errors::GitwatchError;
use gitwatch::types::{FailurePolicy, RecoveryPolicy};
use gitwatch::{Event, SessionOutputs, Shutdown};

type TestResult = Result<(), Box<dyn Error>>;

const ALPHA: &str = "https://git.example.com/team/alpha";
const BETA: &str = "git@git.example.com:team/beta";

fn backend_with(urls: &[&str]) -> FakeBackend {
    let backend = FakeBackend::new();
    for url in urls {
        backend.add_remote(url);
    }
    backend
}

/// Next event, discarding any errors that arrive meanwhile.
async fn next_event_ignoring_errors(outputs: &mut SessionOutputs) -> Event {
    with_timeout(async {
        loop {
            tokio::select! {
                Some(event) = outputs.events.recv() => break event,
                Some(_) = outputs.errors.recv() => {}
            }
        }
    })
    .await
}

#[tokio::test]
async fn broken_local_copy_is_recloned_and_reported_as_change() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = backend_with(&[ALPHA]);
    let shutdown = Shutdown::new();

    let mut running = spawn_session(&shutdown, fast_session(root.path(), &[ALPHA]), backend.clone());
    with_timeout(&mut running.outputs.initial_done).await?;

    let path = root.path().join("alpha");
    let stray = path.join("local-only.txt");
    std::fs::write(&stray, "scratch")?;
    backend.break_local(&path);

    let event = recv_within(&mut running.outputs.events).await;
    assert_eq!(event.url(), ALPHA);
    assert_eq!(event.path(), path);
    assert_eq!(Some(event.commit().id.clone()), backend.remote_head(ALPHA));

    assert_eq!(backend.clone_count(ALPHA), 2);
    assert!(path.is_dir());
    assert!(!stray.exists(), "re-clone should start from an empty directory");

    // Recovery is not an error.
    assert_quiet(&mut running.outputs.errors, Duration::from_millis(100)).await;

    running.handle.close();
    finish(running.task).await.ok();
    Ok(())
}

#[tokio::test]
async fn without_recovery_pull_errors_are_reported() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = backend_with(&[ALPHA]);
    let shutdown = Shutdown::new();

    let config = fast_session(root.path(), &[ALPHA]).with_recovery(RecoveryPolicy::None);
    let mut running = spawn_session(&shutdown, config, backend.clone());
    with_timeout(&mut running.outputs.initial_done).await?;

    let path = root.path().join("alpha");
    backend.break_local(&path);

    let err = recv_within(&mut running.outputs.errors).await;
    assert!(
        matches!(&err, GitwatchError::Pull { url, .. } if url == ALPHA),
        "got {err:?}"
    );
    assert_eq!(backend.clone_count(ALPHA), 1);
    assert!(path.is_dir());

    // The loop keeps going and picks up later commits.
    backend.push_commit(ALPHA, "after the failure");
    let event = recv_within(&mut running.outputs.events).await;
    assert_eq!(event.commit().summary, "after the failure");

    running.handle.close();
    finish(running.task).await.ok();
    Ok(())
}

#[tokio::test]
async fn isolate_keeps_checking_other_repositories() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = backend_with(&[ALPHA, BETA]);
    let shutdown = Shutdown::new();

    let config = fast_session(root.path(), &[ALPHA, BETA])
        .with_failure_policy(FailurePolicy::Isolate);
    let mut running = spawn_session(&shutdown, config, backend.clone());
    with_timeout(&mut running.outputs.initial_done).await?;

    // ALPHA breaks and cannot be re-cloned.
    backend.fail_clones(ALPHA);
    backend.break_local(&root.path().join("alpha"));
    backend.push_commit(BETA, "b1");

    let err = recv_within(&mut running.outputs.errors).await;
    assert!(
        matches!(&err, GitwatchError::Clone { url, .. } if url == ALPHA),
        "got {err:?}"
    );

    let event = recv_within(&mut running.outputs.events).await;
    assert_eq!(event.url(), BETA);
    assert_eq!(event.commit().summary, "b1");

    running.handle.close();
    finish(running.task).await.ok();
    Ok(())
}

#[tokio::test]
async fn fail_fast_skips_the_rest_of_the_pass() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = backend_with(&[ALPHA, BETA]);
    let shutdown = Shutdown::new();

    let config = fast_session(root.path(), &[ALPHA, BETA])
        .with_failure_policy(FailurePolicy::FailFast);
    let mut running = spawn_session(&shutdown, config, backend.clone());
    with_timeout(&mut running.outputs.initial_done).await?;

    backend.fail_clones(ALPHA);
    backend.break_local(&root.path().join("alpha"));
    backend.push_commit(BETA, "b1");

    // Every pass stops at ALPHA, so BETA is never reached.
    let err = recv_within(&mut running.outputs.errors).await;
    assert!(matches!(&err, GitwatchError::Clone { url, .. } if url == ALPHA));
    assert_quiet(&mut running.outputs.events, Duration::from_millis(120)).await;
    assert_eq!(backend.pull_count(&root.path().join("beta")), 0);

    // Once ALPHA can be cloned again both catch up, in order.
    backend.allow_clones(ALPHA);
    let first = next_event_ignoring_errors(&mut running.outputs).await;
    let second = next_event_ignoring_errors(&mut running.outputs).await;
    assert_eq!(first.url(), ALPHA);
    assert_eq!(second.url(), BETA);
    assert_eq!(second.commit().summary, "b1");

    running.handle.close();
    finish(running.task).await.ok();
    Ok(())
}

#[tokio::test]
async fn full_error_channel_applies_backpressure() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let backend = backend_with(&[ALPHA]);
    let shutdown = Shutdown::new();

    let mut config = fast_session(root.path(), &[ALPHA]);
    config.error_capacity = 1;
    let mut running = spawn_session(&shutdown, config, backend.clone());
    with_timeout(&mut running.outputs.initial_done).await?;

    backend.fail_clones(ALPHA);
    backend.break_local(&root.path().join("alpha"));

    // Nobody drains errors: one fills the channel, the next pass blocks on
    // the second, and no further passes start.
    with_timeout(async {
        while backend.clone_count(ALPHA) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.clone_count(ALPHA), 3);

    // Closing still works while blocked.
    running.handle.close();
    let outcome = finish(running.task).await;
    assert!(matches!(outcome, Err(GitwatchError::Cancelled)));
    Ok(())
}
