// src/engine/core.rs

//! Pure scheduler state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`SchedulerEvent`]s and produces:
//! - an updated session state (and repository list)
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Scheduler`) is responsible for:
//! - waiting on the timer, the shutdown signal and the registration channel
//! - running passes against the backend
//! - delivering events and errors
//!
//! The core has no channels, no Tokio types, and performs no IO.

use tracing::debug;

use crate::registry::{RepositoryRegistry, WatchTarget};

/// Lifecycle of a watch session. There is no way back from `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, `run` not called yet.
    Idle,
    /// Running the mandatory first pass.
    Initializing,
    /// Steady-state loop.
    Polling,
    Terminated,
}

/// Which kind of pass to run over the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// First pass: clone what is missing, never pull. Events only when
    /// `emit_events` is set, and then one per repository.
    Initial { emit_events: bool },
    /// Regular pass: pull everything, emit on change or fresh clone.
    Steady,
}

impl PassKind {
    /// Whether a repository that had to be cloned during this pass yields an
    /// event.
    pub fn emits_after_clone(self) -> bool {
        match self {
            PassKind::Initial { emit_events } => emit_events,
            PassKind::Steady => true,
        }
    }

    pub fn is_initial(self) -> bool {
        matches!(self, PassKind::Initial { .. })
    }
}

/// The three sources the scheduler loop waits on.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Cancelled,
    Tick,
    Registered(WatchTarget),
}

/// Command produced by the core, to be executed by the async shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCommand {
    RunPass(PassKind),
    /// Fire the one-shot `InitialDone` notification.
    SignalInitialDone,
}

/// Decision returned by the core after handling one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}

/// Pure scheduler state.
///
/// This owns the repository registry once the session is running; nothing
/// else mutates it.
#[derive(Debug)]
pub struct SchedulerCore {
    state: SessionState,
    registry: RepositoryRegistry,
    initial_event: bool,
}

impl SchedulerCore {
    pub fn new(registry: RepositoryRegistry, initial_event: bool) -> Self {
        Self {
            state: SessionState::Idle,
            registry,
            initial_event,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// Append a target. Used for registrations merged before the first pass
    /// and for `SchedulerEvent::Registered` while polling.
    pub fn register(&mut self, target: WatchTarget) {
        debug!(url = target.url(), path = ?target.path(), "repository registered");
        self.registry.push(target);
    }

    /// `Idle -> Initializing`: schedule the initial pass.
    ///
    /// Calling this in any other state is a no-op that asks the shell to stop.
    pub fn start(&mut self) -> CoreStep {
        if self.state != SessionState::Idle {
            return CoreStep::stop();
        }
        self.transition(SessionState::Initializing);
        CoreStep::proceed(vec![CoreCommand::RunPass(PassKind::Initial {
            emit_events: self.initial_event,
        })])
    }

    /// Outcome of the initial pass.
    ///
    /// Success moves to `Polling` and fires `InitialDone`; failure terminates
    /// the session. Only the first call while `Initializing` has any effect,
    /// so `InitialDone` is requested at most once.
    pub fn initial_pass_finished(&mut self, succeeded: bool) -> CoreStep {
        if self.state != SessionState::Initializing {
            return CoreStep {
                commands: Vec::new(),
                keep_running: self.state == SessionState::Polling,
            };
        }
        if !succeeded {
            self.transition(SessionState::Terminated);
            return CoreStep::stop();
        }
        self.transition(SessionState::Polling);
        CoreStep::proceed(vec![CoreCommand::SignalInitialDone])
    }

    /// Handle one wake-up of the polling loop.
    pub fn step(&mut self, event: SchedulerEvent) -> CoreStep {
        match (self.state, event) {
            (SessionState::Terminated, _) => CoreStep::stop(),
            (_, SchedulerEvent::Cancelled) => {
                self.terminate();
                CoreStep::stop()
            }
            (SessionState::Polling, SchedulerEvent::Tick) => {
                CoreStep::proceed(vec![CoreCommand::RunPass(PassKind::Steady)])
            }
            (_, SchedulerEvent::Registered(target)) => {
                // Checked on the next tick, not now.
                self.register(target);
                CoreStep::proceed(Vec::new())
            }
            (_, SchedulerEvent::Tick) => CoreStep::proceed(Vec::new()),
        }
    }

    /// Force the terminal state, e.g. when a pass observed cancellation.
    pub fn terminate(&mut self) {
        if self.state != SessionState::Terminated {
            self.transition(SessionState::Terminated);
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state transition");
        self.state = next;
    }
}
