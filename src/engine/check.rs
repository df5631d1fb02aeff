// src/engine/check.rs

//! Checking a single repository during a pass.

use tracing::{debug, info};

use crate::backend::{BackendError, Credential, PullOutcome, VcsBackend};
use crate::engine::core::PassKind;
use crate::engine::recovery::recover;
use crate::engine::Event;
use crate::errors::{GitwatchError, Result};
use crate::registry::WatchTarget;
use crate::shutdown::Shutdown;
use crate::types::RecoveryPolicy;

/// Everything a check needs besides the target itself.
#[derive(Debug)]
pub struct CheckContext<'a, B> {
    pub backend: &'a B,
    pub default_credential: Option<&'a Credential>,
    pub recovery: RecoveryPolicy,
    pub shutdown: &'a Shutdown,
}

impl<B> Clone for CheckContext<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for CheckContext<'_, B> {}

impl<'a, B> CheckContext<'a, B> {
    /// The repository's own credential wins over the session default.
    pub fn credential_for<'t>(&self, target: &'t WatchTarget) -> Option<&'t Credential>
    where
        'a: 't,
    {
        target.credential().or(self.default_credential)
    }
}

/// Check one repository and return the event it produced, if any.
///
/// - Missing locally: clone it. A fresh clone yields an event on steady
///   passes, and on the initial pass when initial events are enabled.
/// - Present, initial pass: report the current head (if enabled), no pull.
/// - Present, steady pass: pull; `Changed` yields an event, `Unchanged`
///   yields nothing, a failure hands over to the recovery policy, whose
///   fresh clone always counts as a change.
pub async fn check_repository<B: VcsBackend>(
    ctx: CheckContext<'_, B>,
    target: &WatchTarget,
    pass: PassKind,
) -> Result<Option<Event>> {
    let credential = ctx.credential_for(target);

    let opened = ctx
        .backend
        .open(target.path())
        .await
        .map_err(|source| GitwatchError::Open {
            path: target.path().to_path_buf(),
            source,
        })?;

    let handle = match opened {
        None => {
            info!(
                url = target.url(),
                path = ?target.path(),
                branch = target.branch(),
                "cloning repository"
            );
            let handle = ctx
                .backend
                .clone_repo(
                    target.url(),
                    target.path(),
                    target.branch(),
                    credential,
                    ctx.shutdown,
                )
                .await
                .map_err(|e| GitwatchError::clone_failed(target.url(), e))?;

            if !pass.emits_after_clone() {
                return Ok(None);
            }
            handle
        }
        Some(handle) => match pass {
            PassKind::Initial { emit_events: false } => return Ok(None),
            PassKind::Initial { emit_events: true } => handle,
            PassKind::Steady => {
                let pulled = ctx
                    .backend
                    .pull(&handle, target.branch(), credential, ctx.shutdown)
                    .await;

                match pulled {
                    Ok(PullOutcome::Unchanged) => {
                        debug!(url = target.url(), "already up to date");
                        return Ok(None);
                    }
                    Ok(PullOutcome::Changed) => {
                        debug!(url = target.url(), "new commits pulled");
                        handle
                    }
                    Err(BackendError::Cancelled) => return Err(GitwatchError::Cancelled),
                    Err(pull_error) => {
                        recover(
                            ctx.recovery,
                            ctx.backend,
                            target,
                            credential,
                            ctx.shutdown,
                            pull_error,
                        )
                        .await?
                    }
                }
            }
        },
    };

    let info = ctx
        .backend
        .head_info(&handle)
        .await
        .map_err(|source| GitwatchError::HeadInfo {
            path: target.path().to_path_buf(),
            source,
        })?;

    Ok(Some(Event::from(info)))
}
