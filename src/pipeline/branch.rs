//! Branch normalization
//!
//! Every run ends up on the canonical branch, whatever the repository was
//! created with.

use crate::core::config::CANONICAL_BRANCH;
use crate::core::error::PublishError;
use crate::core::traits::VersionControl;
use serde::Serialize;

/// What normalization had to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BranchAction {
    AlreadyCanonical,
    /// Branch with history renamed in place
    Renamed { from: String },
    /// Symbolic `HEAD` of a commit-less repository pointed at the
    /// canonical branch
    PointedHead { from: Option<String> },
    /// Detached `HEAD` with history moved onto the canonical branch
    Attached,
}

/// Canonical branch name and how it was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchOutcome {
    pub branch: String,
    pub action: BranchAction,
}

/// Decide the action for a repository state without touching it
pub fn plan(current: Option<&str>, has_commits: bool) -> BranchAction {
    match current {
        Some(branch) if branch == CANONICAL_BRANCH => BranchAction::AlreadyCanonical,
        Some(branch) if has_commits => BranchAction::Renamed {
            from: branch.to_string(),
        },
        None if has_commits => BranchAction::Attached,
        other => BranchAction::PointedHead {
            from: other.map(str::to_string),
        },
    }
}

pub struct BranchNormalizer<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> BranchNormalizer<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    /// Make the canonical branch current
    pub async fn normalize(&self) -> Result<BranchOutcome, PublishError> {
        let current = self.vcs.current_branch().await?;
        let has_commits = self.vcs.has_commits().await?;
        let action = plan(current.as_deref(), has_commits);

        match &action {
            BranchAction::AlreadyCanonical => {}
            BranchAction::Renamed { from } => {
                self.vcs.rename_branch(from, CANONICAL_BRANCH).await?;
            }
            BranchAction::PointedHead { .. } => {
                self.vcs.point_head(CANONICAL_BRANCH).await?;
            }
            BranchAction::Attached => {
                tracing::warn!("HEAD is detached; moving it onto {}", CANONICAL_BRANCH);
                self.vcs.attach_head(CANONICAL_BRANCH).await?;
            }
        }

        tracing::debug!(?action, "branch normalized");
        Ok(BranchOutcome {
            branch: CANONICAL_BRANCH.to_string(),
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_canonical_branch_is_noop() {
        assert_eq!(plan(Some("main"), true), BranchAction::AlreadyCanonical);
        assert_eq!(plan(Some("main"), false), BranchAction::AlreadyCanonical);
    }

    #[test]
    fn test_plan_renames_branch_with_history() {
        assert_eq!(
            plan(Some("master"), true),
            BranchAction::Renamed {
                from: "master".to_string()
            }
        );
    }

    #[test]
    fn test_plan_points_head_on_unborn_branch() {
        assert_eq!(
            plan(Some("master"), false),
            BranchAction::PointedHead {
                from: Some("master".to_string())
            }
        );
    }

    #[test]
    fn test_plan_attaches_detached_history() {
        assert_eq!(plan(None, true), BranchAction::Attached);
    }

    #[test]
    fn test_plan_points_head_when_detached_without_commits() {
        assert_eq!(plan(None, false), BranchAction::PointedHead { from: None });
    }
}
