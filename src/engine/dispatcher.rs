// src/engine/dispatcher.rs

//! Delivery of events and errors to the session's consumers.
//!
//! Events go through one internal FIFO queue drained by a single delivery
//! task, so a slow consumer does not hold up a pass and events reach the
//! consumer in the order they were produced. The queue is bounded: once
//! [`DELIVERY_QUEUE_CAPACITY`] events are waiting, emitting waits too.
//!
//! Errors are sent straight to their bounded channel. When it is full the
//! scheduler waits, which makes sustained failure visible as backpressure.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::Event;
use crate::errors::{GitwatchError, Result};
use crate::shutdown::Shutdown;

/// Events buffered between the scheduler and the delivery task.
pub const DELIVERY_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct EventDispatcher {
    queue: mpsc::Sender<Event>,
    errors: mpsc::Sender<GitwatchError>,
}

impl EventDispatcher {
    /// Spawn the delivery task feeding `events`.
    ///
    /// Must be called from within a Tokio runtime. The task exits once the
    /// dispatcher is dropped and the queue has been drained.
    pub fn spawn(events: mpsc::Sender<Event>, errors: mpsc::Sender<GitwatchError>) -> Self {
        let (queue, mut pending) = mpsc::channel::<Event>(DELIVERY_QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = pending.recv().await {
                if let Err(err) = events.send(event).await {
                    debug!(url = err.0.url(), "event receiver dropped; discarding event");
                }
            }
            debug!("event delivery loop finished");
        });

        Self { queue, errors }
    }

    /// Queue an event for delivery.
    ///
    /// Returns as soon as the event is queued; only waits when the internal
    /// queue is full. Returns `GitwatchError::Cancelled` once the session has
    /// shut down, even when there is room.
    pub async fn emit(&self, event: Event, shutdown: &Shutdown) -> Result<()> {
        debug!(url = event.url(), path = ?event.path(), commit = %event.commit().id, "emitting event");
        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(GitwatchError::Cancelled),
            queued = self.queue.send(event) => {
                if let Err(err) = queued {
                    warn!(url = err.0.url(), "event delivery task has stopped; dropping event");
                }
                Ok(())
            }
        }
    }

    /// Hand an error to the error channel, waiting while it is full.
    ///
    /// Returns `GitwatchError::Cancelled` once the session has shut down.
    pub async fn report(&self, error: GitwatchError, shutdown: &Shutdown) -> Result<()> {
        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(GitwatchError::Cancelled),
            sent = self.errors.send(error) => {
                if let Err(err) = sent {
                    debug!(error = %err.0, "error receiver dropped; discarding error");
                }
                Ok(())
            }
        }
    }
}
