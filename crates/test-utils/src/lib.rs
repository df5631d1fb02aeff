pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use gitwatch::errors::Result as GitwatchResult;
use gitwatch::{Session, SessionConfig, SessionHandle, SessionOutputs, Shutdown};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

pub use fake_backend::{Call, FakeBackend, FakeHandle};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=gitwatch=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Receive the next message, failing the test after 5 seconds.
pub async fn recv_within<T>(rx: &mut mpsc::Receiver<T>) -> T {
    with_timeout(rx.recv())
        .await
        .expect("channel closed before a message arrived")
}

/// Assert that nothing arrives on `rx` for `quiet`.
pub async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::Receiver<T>, quiet: Duration) {
    if let Ok(Some(msg)) = tokio::time::timeout(quiet, rx.recv()).await {
        panic!("expected no message within {quiet:?}, got {msg:?}");
    }
}

/// A session running on its own task.
pub struct RunningSession {
    pub handle: SessionHandle,
    pub outputs: SessionOutputs,
    pub task: JoinHandle<GitwatchResult<()>>,
}

/// Build a session over `backend` and spawn `Session::run`.
pub fn spawn_session(
    shutdown: &Shutdown,
    config: SessionConfig,
    backend: FakeBackend,
) -> RunningSession {
    let mut session = Session::new(shutdown, config, backend).expect("valid session config");
    let outputs = session.take_outputs().expect("outputs are taken once");
    let handle = session.handle();
    let task = tokio::spawn(session.run());
    RunningSession {
        handle,
        outputs,
        task,
    }
}

/// Wait for a spawned `Session::run` to return.
pub async fn finish(task: JoinHandle<GitwatchResult<()>>) -> GitwatchResult<()> {
    with_timeout(task).await.expect("session task panicked")
}
