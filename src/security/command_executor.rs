//! SafeCommandExecutor: whitelisted subprocess execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved programs can execute
//! - **Injection prevention**: Arguments are passed as a vector, never through a shell
//! - **Working directory validation**: Validates existence before execution
//! - **Scoped environment**: Extra variables apply to the single child process only
//!
//! # Example
//!
//! ```rust,no_run
//! use repo_publisher::security::SafeCommandExecutor;
//!
//! # async fn example() -> Result<(), repo_publisher::security::CommandError> {
//! let executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! let output = executor.execute("git", &["--version"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use crate::core::error::PublishError;
use crate::core::state_machine::PipelineStage;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;

/// Allowed commands whitelist for security.
///
/// Only these programs can be executed via SafeCommandExecutor.
pub const ALLOWED_COMMANDS: &[&str] = &["git", "web-ext"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Program binary could not be found
    #[error("Command '{0}' was not found")]
    NotFound(String),

    /// Command execution failed (e.g. permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

impl CommandError {
    /// Attribute this error to a pipeline stage
    pub fn into_publish_error(self, stage: PipelineStage) -> PublishError {
        match self {
            CommandError::NotFound(command) => PublishError::DependencyMissing { stage, command },
            CommandError::CommandNotAllowed(command) => PublishError::CommandFailed {
                stage,
                command,
                message: "not in the allowed whitelist".to_string(),
            },
            CommandError::InvalidWorkingDirectory(path) => PublishError::CommandFailed {
                stage,
                command: "spawn".to_string(),
                message: format!("working directory does not exist: {}", path.display()),
            },
            CommandError::ExecutionFailed(message) => PublishError::CommandFailed {
                stage,
                command: "spawn".to_string(),
                message,
            },
        }
    }
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self { working_dir })
    }

    /// Directory commands run in
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Execute a command and capture its output.
    ///
    /// A non-zero exit status is not an error here; callers inspect
    /// `Output::status`.
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        self.execute_with_env(command, args, &[]).await
    }

    /// Execute a command with extra environment variables for this child only.
    pub async fn execute_with_env(
        &self,
        command: &str,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<Output, CommandError> {
        // Whitelist validation: Only pre-approved commands
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        // web-ext is installed through npm, which ships .cmd shims on Windows
        #[cfg(target_os = "windows")]
        let command_name = if command == "web-ext" {
            format!("{}.cmd", command)
        } else {
            command.to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let command_name = command.to_string();

        tracing::debug!(command, ?args, "executing");

        let output = Command::new(&command_name)
            .args(args)
            .envs(envs.iter().copied())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CommandError::NotFound(command.to_string()),
                _ => CommandError::ExecutionFailed(e.to_string()),
            })?;

        tracing::debug!(command, status = ?output.status.code(), "finished");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejected_command_rm() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let result = executor.execute("rm", &["-rf", "/"]).await;
        assert!(
            matches!(result, Err(CommandError::CommandNotAllowed(_))),
            "rm should be rejected as not in whitelist"
        );
    }

    #[tokio::test]
    async fn test_rejected_command_sh() {
        let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
        let result = executor.execute("sh", &["-c", "echo hi"]).await;
        assert!(matches!(result, Err(CommandError::CommandNotAllowed(_))));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = SafeCommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(
            matches!(result, Err(CommandError::InvalidWorkingDirectory(_))),
            "Should reject non-existent working directory"
        );
    }

    #[test]
    fn test_not_found_maps_to_dependency_missing() {
        let err = CommandError::NotFound("web-ext".to_string())
            .into_publish_error(PipelineStage::Submission);

        match err {
            PublishError::DependencyMissing { stage, command } => {
                assert_eq!(stage, PipelineStage::Submission);
                assert_eq!(command, "web-ext");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_allowed_maps_to_command_failed() {
        let err = CommandError::CommandNotAllowed("curl".to_string())
            .into_publish_error(PipelineStage::Push);
        assert_eq!(err.code(), "COMMAND_FAILED");
        assert_eq!(err.stage(), PipelineStage::Push);
    }
}
