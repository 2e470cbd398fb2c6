//! Core traits and types for repository publishing
//!
//! Every external interaction of the pipeline goes through one of three
//! capabilities: the version-control backend, the hosting service and the
//! artifact-review client. Production implementations live in `backends`;
//! tests substitute in-memory fakes.

use crate::core::config::{Channel, ConfigEnum, Protocol};
use crate::core::error::PublishError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Repository state
// ============================================================================

/// Snapshot of the local repository, taken fresh on every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub has_commits: bool,
    pub current_branch: String,
    pub has_upstream: bool,
    pub staged_changes: bool,
}

// ============================================================================
// Remote identity
// ============================================================================

/// Canonical identity of the hosted repository
///
/// `url` is always derived from the other fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    pub protocol: Protocol,
    pub host: String,
    pub owner: String,
    pub repo_name: String,
    pub ssh_user: String,
    pub url: String,
}

impl RemoteIdentity {
    pub fn new(
        protocol: Protocol,
        host: &str,
        owner: &str,
        repo_name: &str,
        ssh_user: &str,
    ) -> Self {
        let url = match protocol {
            Protocol::Https => format!("https://{}/{}/{}.git", host, owner, repo_name),
            Protocol::Ssh => format!("{}@{}:{}/{}.git", ssh_user, host, owner, repo_name),
        };

        Self {
            protocol,
            host: host.to_string(),
            owner: owner.to_string(),
            repo_name: repo_name.to_string(),
            ssh_user: ssh_user.to_string(),
            url,
        }
    }
}

/// Authentication attached to a single network call
#[derive(Debug)]
pub enum NetworkAuth {
    /// Key-based transport; the transport's own key material is trusted
    Transport,
    /// Token answered through a credential-prompt responder
    Token {
        username: String,
        token: SecretString,
    },
}

impl NetworkAuth {
    /// Authentication appropriate for the given protocol
    pub fn for_protocol(protocol: Protocol, username: &str, token: &SecretString) -> Self {
        match protocol {
            Protocol::Https => NetworkAuth::Token {
                username: username.to_string(),
                token: SecretString::from(token.expose_secret().to_owned()),
            },
            Protocol::Ssh => NetworkAuth::Transport,
        }
    }
}

/// Result of asking the hosting service to create the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoCreation {
    Created,
    AlreadyExists,
}

// ============================================================================
// Submission
// ============================================================================

/// Status reported by the artifact-review service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Accepted,
    Rejected,
    Error,
}

/// Outcome of the single submission a run performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub channel: Channel,
    pub status: SubmissionStatus,
    /// Tool output, with known secrets masked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubmissionOutcome {
    /// Turn a non-accepted outcome into the matching fatal error
    pub fn into_result(self) -> Result<SubmissionOutcome, PublishError> {
        let message = self
            .detail
            .clone()
            .unwrap_or_else(|| "no output".to_string());
        match self.status {
            SubmissionStatus::Accepted => Ok(self),
            SubmissionStatus::Rejected => Err(PublishError::SubmissionRejected {
                channel: self.channel.as_str().to_string(),
                message,
            }),
            SubmissionStatus::Error => Err(PublishError::SubmissionError { message }),
        }
    }
}

/// Everything the review client needs for one submission
#[derive(Debug)]
pub struct SubmissionRequest {
    pub source_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub channel: Channel,
    /// Paths and patterns excluded from the submitted artifact
    pub exclusions: Vec<String>,
    pub api_key: SecretString,
    pub api_secret: SecretString,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Version-control backend operating on one working tree
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Whether the working directory is already a repository
    async fn is_repository(&self) -> Result<bool, PublishError>;

    /// Initialize an empty repository
    async fn init(&self) -> Result<(), PublishError>;

    /// Whether `HEAD` resolves to a commit
    async fn has_commits(&self) -> Result<bool, PublishError>;

    /// Branch `HEAD` points at, `None` when detached
    async fn current_branch(&self) -> Result<Option<String>, PublishError>;

    /// Rename a branch, preserving its history; the target must not exist
    async fn rename_branch(&self, from: &str, to: &str) -> Result<(), PublishError>;

    /// Point symbolic `HEAD` at a (possibly unborn) branch
    async fn point_head(&self, branch: &str) -> Result<(), PublishError>;

    /// Put a detached `HEAD` on `branch`, creating it at `HEAD` or
    /// fast-forwarding it there. A branch holding commits `HEAD` does not
    /// contain is a conflict.
    async fn attach_head(&self, branch: &str) -> Result<(), PublishError>;

    /// URL of a configured remote, `None` when absent
    async fn remote_url(&self, remote: &str) -> Result<Option<String>, PublishError>;

    async fn add_remote(&self, remote: &str, url: &str) -> Result<(), PublishError>;

    /// Whether the current branch tracks an upstream
    async fn has_upstream(&self) -> Result<bool, PublishError>;

    /// Record `remote/branch` as the upstream of `branch`
    async fn set_upstream(&self, remote: &str, branch: &str) -> Result<(), PublishError>;

    /// Whether `branch` exists on `remote`
    async fn remote_branch_exists(
        &self,
        remote: &str,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<bool, PublishError>;

    /// Fetch and replay local commits on the remote tip, auto-stashing
    /// uncommitted changes. A failed rebase leaves the branch at its
    /// pre-pull tip.
    async fn pull_rebase(
        &self,
        remote: &str,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<(), PublishError>;

    /// Stage every change in the working tree
    async fn stage_all(&self) -> Result<(), PublishError>;

    /// Drop a path from the staged set; nothing staged is not an error
    async fn unstage(&self, path: &str) -> Result<(), PublishError>;

    /// Whether the index tracks `path`
    async fn is_tracked(&self, path: &str) -> Result<bool, PublishError>;

    /// Remove a path from the index, keeping the working-tree file
    async fn remove_from_index(&self, path: &str) -> Result<(), PublishError>;

    /// Paths whose staged content differs from `HEAD`
    async fn staged_paths(&self) -> Result<Vec<String>, PublishError>;

    async fn commit(&self, message: &str) -> Result<(), PublishError>;

    /// Replace the last commit with the staged tree
    async fn amend(&self, message: &str) -> Result<(), PublishError>;

    /// Push `branch` to `remote`, recording it as upstream
    async fn push(
        &self,
        remote: &str,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<(), PublishError>;
}

/// Hosting service REST API
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Create a public repository owned by the authenticated user
    async fn create_repository(&self, name: &str) -> Result<RepoCreation, PublishError>;
}

/// External artifact-review client
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest)
    -> Result<SubmissionOutcome, PublishError>;
}
