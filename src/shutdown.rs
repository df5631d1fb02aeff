// src/shutdown.rs

//! Cooperative cancellation signal shared by the session, the scheduler loop
//! and in-flight backend operations.
//!
//! A [`Shutdown`] is cheap to clone; every clone observes the same flag.
//! [`Shutdown::child`] derives a signal that fires when either it or its
//! parent is triggered, while triggering the child leaves the parent alone.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    parent: Option<Box<Shutdown>>,
}

impl fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shutdown")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            parent: None,
        }
    }

    /// Derive a signal that is cancelled by `self` or by its own `trigger`.
    pub fn child(&self) -> Self {
        let mut child = Self::new();
        child.parent = Some(Box::new(self.clone()));
        child
    }

    /// Fire the signal. Calling this more than once is harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_triggered())
    }

    /// Resolve once the signal (or any ancestor) has fired.
    pub fn wait(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            match &self.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = fired(self.rx.clone()) => {}
                        _ = parent.wait() => {}
                    }
                }
                None => fired(self.rx.clone()).await,
            }
        })
    }
}

async fn fired(mut rx: watch::Receiver<bool>) {
    // The sender lives as long as any `Shutdown` clone, so an error here only
    // means nobody can trigger us anymore.
    let _ = rx.wait_for(|fired| *fired).await;
}
