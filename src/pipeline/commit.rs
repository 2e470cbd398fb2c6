//! Commit policy
//!
//! | staged diff empty | prior commits | upstream | action |
//! |---|---|---|---|
//! | yes | any | any | skip |
//! | no | no | any | create |
//! | no | yes | yes | create |
//! | no | yes | no | amend |
//!
//! Amending only ever rewrites a commit that has not been published.

use crate::core::config::COMMIT_MESSAGE;
use crate::core::error::PublishError;
use crate::core::traits::{RepositoryState, VersionControl};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitAction {
    Skip,
    Create,
    Amend,
}

impl CommitAction {
    pub fn decide(state: &RepositoryState) -> Self {
        match (state.staged_changes, state.has_commits, state.has_upstream) {
            (false, _, _) => CommitAction::Skip,
            (true, false, _) => CommitAction::Create,
            (true, true, true) => CommitAction::Create,
            (true, true, false) => CommitAction::Amend,
        }
    }
}

pub struct CommitPolicy<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> CommitPolicy<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    pub async fn apply(&self, state: &RepositoryState) -> Result<CommitAction, PublishError> {
        let action = CommitAction::decide(state);
        match action {
            CommitAction::Skip => tracing::info!("nothing staged, no commit"),
            CommitAction::Create => self.vcs.commit(COMMIT_MESSAGE).await?,
            CommitAction::Amend => self.vcs.amend(COMMIT_MESSAGE).await?,
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(staged_changes: bool, has_commits: bool, has_upstream: bool) -> RepositoryState {
        RepositoryState {
            has_commits,
            current_branch: "main".to_string(),
            has_upstream,
            staged_changes,
        }
    }

    #[test]
    fn test_empty_diff_skips() {
        for has_commits in [false, true] {
            for has_upstream in [false, true] {
                assert_eq!(
                    CommitAction::decide(&state(false, has_commits, has_upstream)),
                    CommitAction::Skip
                );
            }
        }
    }

    #[test]
    fn test_first_commit_is_created() {
        assert_eq!(CommitAction::decide(&state(true, false, false)), CommitAction::Create);
    }

    #[test]
    fn test_published_history_gets_new_commit() {
        assert_eq!(CommitAction::decide(&state(true, true, true)), CommitAction::Create);
    }

    #[test]
    fn test_unpublished_commit_is_amended() {
        assert_eq!(CommitAction::decide(&state(true, true, false)), CommitAction::Amend);
    }
}
