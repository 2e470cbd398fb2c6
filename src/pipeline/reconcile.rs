//! History reconciliation
//!
//! ```text
//! CheckRemoteBranch ──absent──▶ FirstPublish
//!        │
//!     present
//!        ▼
//!       Sync ──ok──▶ Synced
//!        │
//!      error
//!        ▼
//!      Failed
//! ```
//!
//! A failed pull leaves the branch at its pre-pull tip; nothing is forced
//! and nothing is resolved automatically.

use crate::core::config::REMOTE_NAME;
use crate::core::error::PublishError;
use crate::core::traits::{NetworkAuth, VersionControl};
use serde::Serialize;

/// Reconciliation states
#[derive(Debug)]
pub enum ReconcileState {
    CheckRemoteBranch,
    FirstPublish,
    Sync,
    Synced,
    Failed(PublishError),
}

/// Terminal success states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Remote branch absent, nothing to pull
    FirstPublish,
    /// Local branch rebased onto the remote and tracking it
    Synced,
}

pub struct HistoryReconciler<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> HistoryReconciler<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    pub async fn reconcile(
        &self,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<ReconcileOutcome, PublishError> {
        let mut state = ReconcileState::CheckRemoteBranch;

        loop {
            tracing::debug!(state = ?state, "reconcile");
            state = match state {
                ReconcileState::CheckRemoteBranch => {
                    match self.vcs.remote_branch_exists(REMOTE_NAME, branch, auth).await {
                        Ok(true) => ReconcileState::Sync,
                        Ok(false) => ReconcileState::FirstPublish,
                        Err(e) => ReconcileState::Failed(e),
                    }
                }
                ReconcileState::Sync => match self.sync(branch, auth).await {
                    Ok(()) => ReconcileState::Synced,
                    Err(e) => ReconcileState::Failed(e),
                },
                ReconcileState::FirstPublish => return Ok(ReconcileOutcome::FirstPublish),
                ReconcileState::Synced => return Ok(ReconcileOutcome::Synced),
                ReconcileState::Failed(e) => return Err(e),
            };
        }
    }

    async fn sync(&self, branch: &str, auth: &NetworkAuth) -> Result<(), PublishError> {
        self.vcs.pull_rebase(REMOTE_NAME, branch, auth).await?;
        // The remote tip is now part of local history; later commits must
        // not amend it.
        self.vcs.set_upstream(REMOTE_NAME, branch).await
    }
}
