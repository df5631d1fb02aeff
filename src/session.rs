// src/session.rs

//! Public entry point: a watch session over a set of repositories.
//!
//! ```no_run
//! # async fn demo() -> gitwatch::errors::Result<()> {
//! use std::time::Duration;
//! use gitwatch::{GitCliBackend, Repository, Session, SessionConfig, Shutdown};
//!
//! let shutdown = Shutdown::new();
//! let config = SessionConfig::new(
//!     vec!["https://github.com/user/repo#main".parse::<Repository>()?],
//!     Duration::from_secs(30),
//!     "gitwatch",
//! );
//! let mut session = Session::new(&shutdown, config, GitCliBackend::new())?;
//! let mut outputs = session.take_outputs().expect("outputs are taken once");
//!
//! tokio::spawn(async move {
//!     while let Some(event) = outputs.events.recv().await {
//!         println!("{event}");
//!     }
//! });
//!
//! session.run().await
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::backend::{Credential, VcsBackend};
use crate::engine::{Event, EventDispatcher, Scheduler, SchedulerCore, SchedulerSettings};
use crate::errors::{GitwatchError, Result};
use crate::registry::{hydrate, Repository, RepositoryRegistry, WatchTarget};
use crate::shutdown::Shutdown;
use crate::types::{FailurePolicy, RecoveryPolicy};

/// Capacity of the error channel unless configured otherwise.
pub const DEFAULT_ERROR_CAPACITY: usize = 16;

/// Parameters of a watch session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub repositories: Vec<Repository>,
    /// Time between steady-state passes.
    pub interval: Duration,
    /// Root under which every repository gets its own folder.
    pub directory: PathBuf,
    /// Used for repositories without their own credential.
    pub credential: Option<Credential>,
    /// Emit one event per repository during the initial pass.
    pub initial_event: bool,
    pub failure_policy: FailurePolicy,
    pub recovery: RecoveryPolicy,
    /// Event channel capacity; defaults to the initial repository count.
    pub event_capacity: Option<usize>,
    pub error_capacity: usize,
}

impl SessionConfig {
    pub fn new(
        repositories: Vec<Repository>,
        interval: Duration,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repositories,
            interval,
            directory: directory.into(),
            credential: None,
            initial_event: false,
            failure_policy: FailurePolicy::default(),
            recovery: RecoveryPolicy::default(),
            event_capacity: None,
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_initial_event(mut self, initial_event: bool) -> Self {
        self.initial_event = initial_event;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }
}

/// Receiving ends of the session's outward channels.
#[derive(Debug)]
pub struct SessionOutputs {
    /// One entry per detected change.
    pub events: mpsc::Receiver<Event>,
    /// Non-fatal errors from steady-state passes.
    pub errors: mpsc::Receiver<GitwatchError>,
    /// Fires once, after the initial pass completed successfully.
    pub initial_done: oneshot::Receiver<()>,
}

/// Cloneable control surface usable while [`Session::run`] owns the session.
#[derive(Clone)]
pub struct SessionHandle {
    root: PathBuf,
    registrations: mpsc::UnboundedSender<WatchTarget>,
    shutdown: Shutdown,
    running: Arc<AtomicBool>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("root", &self.root)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Register another repository.
    ///
    /// The scheduler merges it on its next wake-up and checks it from the
    /// following tick on. Registrations made before `run` starts are included
    /// in the initial pass.
    pub fn add(&self, repository: Repository) -> Result<()> {
        let target = hydrate(&self.root, repository)?;
        debug!(url = target.url(), "forwarding registration to scheduler");
        self.registrations
            .send(target)
            .map_err(|_| GitwatchError::Cancelled)
    }

    /// Request shutdown. Does not wait for the loop to stop.
    pub fn close(&self) {
        self.shutdown.trigger();
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A configured watch session, not yet running.
pub struct Session<B: VcsBackend> {
    registry: RepositoryRegistry,
    settings: SchedulerSettings,
    initial_event: bool,
    backend: B,
    shutdown: Shutdown,
    running: Arc<AtomicBool>,
    registrations_tx: mpsc::UnboundedSender<WatchTarget>,
    registrations_rx: mpsc::UnboundedReceiver<WatchTarget>,
    events_tx: mpsc::Sender<Event>,
    errors_tx: mpsc::Sender<GitwatchError>,
    initial_done_tx: oneshot::Sender<()>,
    outputs: Option<SessionOutputs>,
}

impl<B: VcsBackend> fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("initial_event", &self.initial_event)
            .finish_non_exhaustive()
    }
}

impl<B: VcsBackend> Session<B> {
    /// Build a session. Every repository is hydrated here, so a malformed
    /// locator fails construction.
    ///
    /// The session derives its own cancellation from `shutdown`: triggering
    /// `shutdown` stops the session, while [`Session::close`] leaves the
    /// caller's signal untouched.
    pub fn new(shutdown: &Shutdown, config: SessionConfig, backend: B) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(GitwatchError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if config.error_capacity == 0 || config.event_capacity == Some(0) {
            return Err(GitwatchError::ConfigError(
                "channel capacities must be >= 1".to_string(),
            ));
        }

        let registry = RepositoryRegistry::new(config.directory, config.repositories)?;

        let event_capacity = config.event_capacity.unwrap_or(registry.len()).max(1);
        let (events_tx, events) = mpsc::channel(event_capacity);
        let (errors_tx, errors) = mpsc::channel(config.error_capacity);
        let (initial_done_tx, initial_done) = oneshot::channel();
        let (registrations_tx, registrations_rx) = mpsc::unbounded_channel();

        Ok(Self {
            registry,
            settings: SchedulerSettings {
                interval: config.interval,
                default_credential: config.credential,
                failure_policy: config.failure_policy,
                recovery: config.recovery,
            },
            initial_event: config.initial_event,
            backend,
            shutdown: shutdown.child(),
            running: Arc::new(AtomicBool::new(false)),
            registrations_tx,
            registrations_rx,
            events_tx,
            errors_tx,
            initial_done_tx,
            outputs: Some(SessionOutputs {
                events,
                errors,
                initial_done,
            }),
        })
    }

    /// Repositories configured so far, in check order.
    pub fn repositories(&self) -> &[WatchTarget] {
        self.registry.targets()
    }

    /// Append a repository before the session runs.
    pub fn add(&mut self, repository: Repository) -> Result<()> {
        self.registry.register(repository)?;
        Ok(())
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            root: self.registry.root().to_path_buf(),
            registrations: self.registrations_tx.clone(),
            shutdown: self.shutdown.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Take the receiving ends of the outward channels. Returns `None` after
    /// the first call.
    pub fn take_outputs(&mut self) -> Option<SessionOutputs> {
        self.outputs.take()
    }

    pub fn close(&self) {
        self.shutdown.trigger();
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the initial pass, then poll until cancelled.
    ///
    /// Returns `GitwatchError::Cancelled` after `close` (or the parent
    /// signal), or the error that aborted the initial pass.
    pub async fn run(self) -> Result<()> {
        let Session {
            registry,
            settings,
            initial_event,
            backend,
            shutdown,
            running,
            registrations_tx,
            registrations_rx,
            events_tx,
            errors_tx,
            initial_done_tx,
            outputs: _,
        } = self;

        // Handles keep their own senders.
        drop(registrations_tx);

        let dispatcher = EventDispatcher::spawn(events_tx, errors_tx);
        let scheduler = Scheduler::new(
            SchedulerCore::new(registry, initial_event),
            backend,
            settings,
            shutdown,
            registrations_rx,
            dispatcher,
            initial_done_tx,
            running,
        );
        scheduler.run().await
    }
}
