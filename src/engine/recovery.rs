// src/engine/recovery.rs

//! Recovery of local copies that can no longer be synchronised.

use std::io::ErrorKind;

use tracing::{info, warn};

use crate::backend::{BackendError, Credential, VcsBackend};
use crate::errors::{GitwatchError, Result};
use crate::registry::WatchTarget;
use crate::shutdown::Shutdown;
use crate::types::RecoveryPolicy;

/// Rebuild `target` after `pull_error`.
///
/// With [`RecoveryPolicy::Reclone`] the whole local path is deleted and the
/// repository cloned again; the returned handle points at the fresh copy.
/// With [`RecoveryPolicy::None`] the pull error is returned as is.
pub async fn recover<B: VcsBackend>(
    policy: RecoveryPolicy,
    backend: &B,
    target: &WatchTarget,
    credential: Option<&Credential>,
    shutdown: &Shutdown,
    pull_error: BackendError,
) -> Result<B::Handle> {
    match policy {
        RecoveryPolicy::None => Err(GitwatchError::pull_failed(target.url(), pull_error)),
        RecoveryPolicy::Reclone => {
            warn!(
                url = target.url(),
                path = ?target.path(),
                error = %pull_error,
                "pull failed; discarding local copy and re-cloning"
            );

            match tokio::fs::remove_dir_all(target.path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(GitwatchError::RecoveryCleanup {
                        path: target.path().to_path_buf(),
                        source,
                    });
                }
            }

            let handle = backend
                .clone_repo(
                    target.url(),
                    target.path(),
                    target.branch(),
                    credential,
                    shutdown,
                )
                .await
                .map_err(|e| GitwatchError::clone_failed(target.url(), e))?;

            info!(url = target.url(), path = ?target.path(), "re-clone complete");
            Ok(handle)
        }
    }
}
