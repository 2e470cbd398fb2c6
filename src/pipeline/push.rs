//! Authenticated push of the canonical branch

use crate::core::config::REMOTE_NAME;
use crate::core::error::PublishError;
use crate::core::traits::{NetworkAuth, VersionControl};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed,
    /// Unborn branch with nothing committed
    NothingToPush,
}

pub struct PushExecutor<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> PushExecutor<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    /// Push `branch` to `origin` and record it as upstream
    pub async fn push(&self, branch: &str, auth: &NetworkAuth) -> Result<PushOutcome, PublishError> {
        if !self.vcs.has_commits().await? {
            tracing::info!(branch, "no commits to push");
            return Ok(PushOutcome::NothingToPush);
        }

        self.vcs.push(REMOTE_NAME, branch, auth).await?;
        Ok(PushOutcome::Pushed)
    }
}
