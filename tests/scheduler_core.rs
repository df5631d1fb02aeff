// tests/scheduler_core.rs

use std::error::Error;

use gitwatch::engine::{
    CoreCommand, CoreStep, PassKind, SchedulerCore, SchedulerEvent, SessionState,
};
use gitwatch::registry::{hydrate, RepositoryRegistry};
use gitwatch::Repository;

type TestResult = Result<(), Box<dyn Error>>;

fn core_with(urls: &[&str], initial_event: bool) -> Result<SchedulerCore, Box<dyn Error>> {
    let repos = urls.iter().map(|u| Repository::new(*u)).collect();
    let registry = RepositoryRegistry::new("/watch", repos)?;
    Ok(SchedulerCore::new(registry, initial_event))
}

fn polling_core() -> Result<SchedulerCore, Box<dyn Error>> {
    let mut core = core_with(&["https://example.com/a/repo"], false)?;
    core.start();
    core.initial_pass_finished(true);
    Ok(core)
}

#[test]
fn start_schedules_initial_pass() -> TestResult {
    let mut core = core_with(&["https://example.com/a/repo"], true)?;
    assert_eq!(core.state(), SessionState::Idle);

    let step = core.start();
    assert_eq!(core.state(), SessionState::Initializing);
    assert!(step.keep_running);
    assert_eq!(
        step.commands,
        vec![CoreCommand::RunPass(PassKind::Initial { emit_events: true })]
    );
    Ok(())
}

#[test]
fn start_twice_stops() -> TestResult {
    let mut core = core_with(&["https://example.com/a/repo"], false)?;
    core.start();
    let again = core.start();
    assert!(!again.keep_running);
    assert!(again.commands.is_empty());
    Ok(())
}

#[test]
fn successful_initial_pass_signals_once() -> TestResult {
    let mut core = core_with(&["https://example.com/a/repo"], false)?;
    core.start();

    let first = core.initial_pass_finished(true);
    assert_eq!(core.state(), SessionState::Polling);
    assert_eq!(first.commands, vec![CoreCommand::SignalInitialDone]);

    let second = core.initial_pass_finished(true);
    assert!(second.commands.is_empty());
    assert!(second.keep_running);
    Ok(())
}

#[test]
fn failed_initial_pass_terminates() -> TestResult {
    let mut core = core_with(&["https://example.com/a/repo"], false)?;
    core.start();

    let step = core.initial_pass_finished(false);
    assert_eq!(core.state(), SessionState::Terminated);
    assert_eq!(
        step,
        CoreStep {
            commands: vec![],
            keep_running: false
        }
    );
    Ok(())
}

#[test]
fn tick_while_polling_runs_steady_pass() -> TestResult {
    let mut core = polling_core()?;
    let step = core.step(SchedulerEvent::Tick);
    assert_eq!(step.commands, vec![CoreCommand::RunPass(PassKind::Steady)]);
    assert!(step.keep_running);
    Ok(())
}

#[test]
fn tick_before_polling_does_nothing() -> TestResult {
    let mut core = core_with(&["https://example.com/a/repo"], false)?;
    let step = core.step(SchedulerEvent::Tick);
    assert!(step.commands.is_empty());
    assert_eq!(core.state(), SessionState::Idle);
    Ok(())
}

#[test]
fn registration_appends_without_running_a_pass() -> TestResult {
    let mut core = polling_core()?;
    let target = hydrate(
        core.registry().root(),
        Repository::new("git@example.com:b/other"),
    )?;

    let step = core.step(SchedulerEvent::Registered(target));
    assert!(step.commands.is_empty());
    assert!(step.keep_running);
    assert_eq!(core.registry().len(), 2);
    assert_eq!(core.registry().targets()[1].url(), "git@example.com:b/other");
    Ok(())
}

#[test]
fn cancellation_is_terminal() -> TestResult {
    let mut core = polling_core()?;

    let step = core.step(SchedulerEvent::Cancelled);
    assert!(!step.keep_running);
    assert_eq!(core.state(), SessionState::Terminated);

    // Nothing revives a terminated session.
    assert!(!core.step(SchedulerEvent::Tick).keep_running);
    assert!(!core.start().keep_running);
    assert_eq!(core.state(), SessionState::Terminated);
    Ok(())
}

#[test]
fn pass_kinds_decide_emission_after_clone() {
    assert!(PassKind::Steady.emits_after_clone());
    assert!(PassKind::Initial { emit_events: true }.emits_after_clone());
    assert!(!PassKind::Initial { emit_events: false }.emits_after_clone());
    assert!(!PassKind::Steady.is_initial());
}
