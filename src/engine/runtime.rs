// src/engine/runtime.rs

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::{Credential, VcsBackend};
use crate::errors::{GitwatchError, Result};
use crate::registry::WatchTarget;
use crate::shutdown::Shutdown;
use crate::types::{FailurePolicy, RecoveryPolicy};

use super::check::{check_repository, CheckContext};
use super::core::{CoreCommand, PassKind, SchedulerCore, SchedulerEvent, SessionState};
use super::dispatcher::EventDispatcher;

/// Knobs the scheduler loop needs besides the registry.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub default_credential: Option<Credential>,
    pub failure_policy: FailurePolicy,
    pub recovery: RecoveryPolicy,
}

/// Drives passes over the registry in response to timer ticks, cancellation
/// and registrations, and delegates repository operations to a `VcsBackend`.
///
/// This is the IO shell around `SchedulerCore`, which decides what happens
/// on each wake-up. It is the only owner of the repository list while the
/// session runs.
pub struct Scheduler<B: VcsBackend> {
    core: SchedulerCore,
    backend: B,
    settings: SchedulerSettings,
    shutdown: Shutdown,
    registrations: mpsc::UnboundedReceiver<WatchTarget>,
    dispatcher: EventDispatcher,
    initial_done: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
}

impl<B: VcsBackend> fmt::Debug for Scheduler<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("core", &self.core)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<B: VcsBackend> Scheduler<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        core: SchedulerCore,
        backend: B,
        settings: SchedulerSettings,
        shutdown: Shutdown,
        registrations: mpsc::UnboundedReceiver<WatchTarget>,
        dispatcher: EventDispatcher,
        initial_done: oneshot::Sender<()>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            core,
            backend,
            settings,
            shutdown,
            registrations,
            dispatcher,
            initial_done: Some(initial_done),
            running,
        }
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    /// Run until cancelled or until the initial pass fails.
    ///
    /// Never returns `Ok`: the outcome is either `GitwatchError::Cancelled`
    /// or the error that aborted the initial pass.
    pub async fn run(mut self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let outcome = self.run_inner().await;
        self.core.terminate();
        self.running.store(false, Ordering::SeqCst);

        match &outcome {
            Err(err) if err.is_cancelled() => info!("gitwatch session cancelled"),
            Err(err) => warn!(error = %err, "gitwatch session stopped"),
            Ok(()) => {}
        }
        outcome
    }

    async fn run_inner(&mut self) -> Result<()> {
        // Registrations queued before `run` count as configured repositories.
        while let Ok(target) = self.registrations.try_recv() {
            self.core.register(target);
        }

        info!(
            repositories = self.core.registry().len(),
            interval = ?self.settings.interval,
            "gitwatch session starting"
        );

        let step = self.core.start();
        let initial = self.execute_commands(step.commands).await;
        let step = self.core.initial_pass_finished(initial.is_ok());
        initial?;
        self.execute_commands(step.commands).await?;
        if !step.keep_running {
            return Err(GitwatchError::Cancelled);
        }

        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Exactly one source is serviced per wake-up. Cancellation is
            // checked first so no pass starts after `close`.
            let event = tokio::select! {
                biased;
                _ = self.shutdown.wait() => SchedulerEvent::Cancelled,
                Some(target) = self.registrations.recv() => SchedulerEvent::Registered(target),
                _ = ticker.tick() => SchedulerEvent::Tick,
            };

            debug!(?event, "scheduler woke up");

            let step = self.core.step(event);
            self.execute_commands(step.commands).await?;

            if !step.keep_running {
                return Err(GitwatchError::Cancelled);
            }
        }
    }

    async fn execute_commands(&mut self, commands: Vec<CoreCommand>) -> Result<()> {
        for command in commands {
            match command {
                CoreCommand::RunPass(pass) if pass.is_initial() => self.initial_pass(pass).await?,
                CoreCommand::RunPass(pass) => self.steady_pass(pass).await?,
                CoreCommand::SignalInitialDone => {
                    if let Some(tx) = self.initial_done.take() {
                        // Nobody listening is fine.
                        let _ = tx.send(());
                        info!("initial pass complete");
                    }
                }
            }
        }
        Ok(())
    }

    fn context(&self) -> CheckContext<'_, B> {
        CheckContext {
            backend: &self.backend,
            default_credential: self.settings.default_credential.as_ref(),
            recovery: self.settings.recovery,
            shutdown: &self.shutdown,
        }
    }

    /// Every repository is visited; any error aborts the session.
    async fn initial_pass(&self, pass: PassKind) -> Result<()> {
        let ctx = self.context();
        for target in self.core.registry().targets() {
            if self.shutdown.is_triggered() {
                return Err(GitwatchError::Cancelled);
            }
            if let Some(event) = check_repository(ctx, target, pass).await? {
                self.dispatcher.emit(event, &self.shutdown).await?;
            }
        }
        Ok(())
    }

    /// Errors go to the error channel instead of stopping the loop. Only
    /// cancellation escapes.
    async fn steady_pass(&self, pass: PassKind) -> Result<()> {
        let ctx = self.context();
        let targets = self.core.registry().targets();
        debug!(repositories = targets.len(), "starting pass");

        for target in targets {
            if self.shutdown.is_triggered() {
                return Err(GitwatchError::Cancelled);
            }

            match check_repository(ctx, target, pass).await {
                Ok(Some(event)) => self.dispatcher.emit(event, &self.shutdown).await?,
                Ok(None) => {}
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(url = target.url(), error = %err, "repository check failed");
                    self.dispatcher.report(err, &self.shutdown).await?;

                    if self.settings.failure_policy == FailurePolicy::FailFast {
                        debug!("skipping the rest of this pass");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
