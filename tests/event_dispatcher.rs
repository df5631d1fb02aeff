// tests/event_dispatcher.rs

mod common;
use crate::common::{recv_within, with_timeout};

use std::error::Error;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use gitwatch::backend::{Commit, HeadInfo};
use gitwatch::engine::EventDispatcher;
use gitwatch::errors::GitwatchError;
use gitwatch::{Event, Shutdown};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

fn event(id: &str) -> Event {
    Event::from(HeadInfo {
        remote_url: "https://example.com/group/repo".to_string(),
        root_path: PathBuf::from("/watch/repo"),
        author_time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        commit: Commit {
            id: id.to_string(),
            author_name: "Ada".to_string(),
            author_email: "ada@example.com".to_string(),
            summary: "change".to_string(),
        },
    })
}

#[tokio::test]
async fn events_are_delivered_in_order() -> TestResult {
    let (events_tx, mut events_rx) = mpsc::channel(4);
    let (errors_tx, _errors_rx) = mpsc::channel(4);
    let dispatcher = EventDispatcher::spawn(events_tx, errors_tx);
    let shutdown = Shutdown::new();

    for id in ["a", "b", "c"] {
        dispatcher.emit(event(id), &shutdown).await?;
    }

    for id in ["a", "b", "c"] {
        assert_eq!(recv_within(&mut events_rx).await.commit().id, id);
    }
    Ok(())
}

#[tokio::test]
async fn emit_after_shutdown_is_always_cancelled() {
    let (events_tx, _events_rx) = mpsc::channel(4);
    let (errors_tx, _errors_rx) = mpsc::channel(4);
    let dispatcher = EventDispatcher::spawn(events_tx, errors_tx);
    let shutdown = Shutdown::new();
    shutdown.trigger();

    // The queue has room every time, so only ordering decides the outcome.
    for _ in 0..64 {
        let result = with_timeout(dispatcher.emit(event("late"), &shutdown)).await;
        assert!(matches!(result, Err(GitwatchError::Cancelled)), "got {result:?}");
    }
}

#[tokio::test]
async fn report_after_shutdown_is_always_cancelled() {
    let (events_tx, _events_rx) = mpsc::channel(4);
    let (errors_tx, mut errors_rx) = mpsc::channel(64);
    let dispatcher = EventDispatcher::spawn(events_tx, errors_tx);
    let shutdown = Shutdown::new();
    shutdown.trigger();

    for _ in 0..32 {
        let result = with_timeout(
            dispatcher.report(GitwatchError::ConfigError("late".to_string()), &shutdown),
        )
        .await;
        assert!(matches!(result, Err(GitwatchError::Cancelled)), "got {result:?}");
    }
    assert!(errors_rx.try_recv().is_err());
}

#[tokio::test]
async fn full_error_channel_waits_until_shutdown() {
    let (events_tx, _events_rx) = mpsc::channel(4);
    let (errors_tx, _errors_rx) = mpsc::channel(1);
    let dispatcher = EventDispatcher::spawn(events_tx, errors_tx);
    let shutdown = Shutdown::new();

    let first = dispatcher
        .report(GitwatchError::ConfigError("first".to_string()), &shutdown)
        .await;
    assert!(first.is_ok());

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            shutdown.trigger();
        })
    };

    let second = with_timeout(
        dispatcher.report(GitwatchError::ConfigError("second".to_string()), &shutdown),
    )
    .await;
    assert!(matches!(second, Err(GitwatchError::Cancelled)), "got {second:?}");
    let _ = trigger.await;
}
