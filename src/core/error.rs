//! Error handling for repository publishing
//!
//! Every failure in the pipeline is fatal. Each variant knows the stage it
//! belongs to so the operator diagnostic can name it, and carries recovery
//! guidance in the same way for every stage.

use crate::core::state_machine::PipelineStage;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Environment errors
    #[error("[{stage}] required command '{command}' was not found on PATH")]
    DependencyMissing {
        stage: PipelineStage,
        command: String,
    },

    #[error("[configuration] invalid value '{value}' for {key} (expected one of: {expected})")]
    InvalidConfiguration {
        key: String,
        value: String,
        expected: String,
    },

    // Credential errors
    #[error("[credentials] {name} is not set and {} holds no value", path.display())]
    CredentialMissing { name: String, path: PathBuf },

    // Branch errors
    #[error("[branch] cannot make {branch} current: {message}")]
    BranchConflict { branch: String, message: String },

    // Remote errors
    #[error("[remote] existing remote points at {existing}, expected {expected}")]
    RemoteConfigConflict { existing: String, expected: String },

    #[error("[{stage}] authentication failed: {message}")]
    AuthenticationFailure {
        stage: PipelineStage,
        message: String,
    },

    #[error("[{stage}] no response from remote: {message}")]
    TransportFailure {
        stage: PipelineStage,
        message: String,
    },

    #[error("[remote] unexpected API response (HTTP {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    // History errors
    #[error("[reconcile] could not rebase onto the remote branch: {message}")]
    ReconciliationConflict { message: String },

    // Submission errors
    #[error("[submission] {channel} submission was rejected: {message}")]
    SubmissionRejected { channel: String, message: String },

    #[error("[submission] submission could not be completed: {message}")]
    SubmissionError { message: String },

    // Staging errors
    #[error("[staging] sensitive path is still staged: {path}")]
    SensitivePathStaged { path: String },

    // Command execution errors
    #[error("[{stage}] {command} failed: {message}")]
    CommandFailed {
        stage: PipelineStage,
        command: String,
        message: String,
    },

    #[error("[{stage}] I/O error at {}: {source}", path.display())]
    Io {
        stage: PipelineStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    /// Get the pipeline stage this error belongs to
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::DependencyMissing { stage, .. }
            | Self::AuthenticationFailure { stage, .. }
            | Self::TransportFailure { stage, .. }
            | Self::CommandFailed { stage, .. }
            | Self::Io { stage, .. } => *stage,
            Self::InvalidConfiguration { .. } => PipelineStage::Initial,
            Self::CredentialMissing { .. } => PipelineStage::Credentials,
            Self::BranchConflict { .. } => PipelineStage::Branch,
            Self::RemoteConfigConflict { .. } | Self::UnexpectedResponse { .. } => {
                PipelineStage::Remote
            }
            Self::ReconciliationConflict { .. } => PipelineStage::Reconcile,
            Self::SubmissionRejected { .. } | Self::SubmissionError { .. } => {
                PipelineStage::Submission
            }
            Self::SensitivePathStaged { .. } => PipelineStage::Staging,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::DependencyMissing { .. } => vec![
                "Install the missing command and make sure it is on PATH",
                "git and web-ext are both required",
            ],
            Self::InvalidConfiguration { .. } => vec![
                "Check the PUBLISH_* environment variables",
                "Check .repo-publish.yaml in the source directory",
            ],
            Self::CredentialMissing { .. } => vec![
                "Export the environment variable, or",
                "Paste the value on the first non-comment line of the secret file",
            ],
            Self::BranchConflict { .. } => vec![
                "Merge the other branch into main, or delete the one you no longer need",
                "Delete a stale branch with: git branch -D <branch>, then run again",
            ],
            Self::RemoteConfigConflict { .. } => vec![
                "Fix the remote manually: git remote set-url origin <url>",
                "Or adjust PUBLISH_OWNER / PUBLISH_PROTOCOL / PUBLISH_REPO_NAME",
            ],
            Self::AuthenticationFailure { .. } => vec![
                "Check that the token is valid and has the repo scope",
                "For ssh, check that your key is loaded in the agent",
            ],
            Self::TransportFailure { .. } => vec![
                "Check your network connection",
                "Run again once the hosting service is reachable",
            ],
            Self::UnexpectedResponse { .. } => {
                vec!["Inspect the response body above", "Check the hosting service status"]
            }
            Self::ReconciliationConflict { .. } => vec![
                "Resolve the divergence manually: git pull --rebase origin main",
                "Run again once the local branch rebases cleanly",
            ],
            Self::SubmissionRejected { .. } => vec![
                "Inspect the submission output above",
                "Fix the reported problems and run again",
            ],
            Self::SubmissionError { .. } => {
                vec!["Check the submission key and secret", "Check the metadata document"]
            }
            Self::SensitivePathStaged { .. } => vec![
                "Remove the file from the index: git rm --cached <path>",
                "Check that it is listed in .gitignore",
            ],
            Self::CommandFailed { .. } => vec![
                "Check the command output above",
                "Run git status to inspect the repository",
            ],
            Self::Io { .. } => vec!["Check file permissions in the source directory"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::DependencyMissing { .. } => "DEPENDENCY_MISSING",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::CredentialMissing { .. } => "CREDENTIAL_MISSING",
            Self::BranchConflict { .. } => "BRANCH_CONFLICT",
            Self::RemoteConfigConflict { .. } => "REMOTE_CONFIG_CONFLICT",
            Self::AuthenticationFailure { .. } => "AUTHENTICATION_FAILURE",
            Self::TransportFailure { .. } => "TRANSPORT_FAILURE",
            Self::UnexpectedResponse { .. } => "UNEXPECTED_RESPONSE",
            Self::ReconciliationConflict { .. } => "RECONCILIATION_CONFLICT",
            Self::SubmissionRejected { .. } => "SUBMISSION_REJECTED",
            Self::SubmissionError { .. } => "SUBMISSION_ERROR",
            Self::SensitivePathStaged { .. } => "SENSITIVE_PATH_STAGED",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::Io { .. } => "IO_ERROR",
        }
    }
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(
    stage: PipelineStage,
    path: impl Into<PathBuf>,
    source: std::io::Error,
) -> PublishError {
    PublishError::Io {
        stage,
        path: path.into(),
        source,
    }
}
