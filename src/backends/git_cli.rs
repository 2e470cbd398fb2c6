//! Version-control backend driving the system `git` binary
//!
//! The command line is used instead of a library binding because the
//! pipeline needs `pull --rebase --autostash` and `GIT_ASKPASS` prompting,
//! which only the real client provides with its usual semantics.

use crate::core::error::{PublishError, io_err};
use crate::core::state_machine::PipelineStage;
use crate::core::traits::{NetworkAuth, VersionControl};
use crate::security::askpass::PromptResponder;
use crate::security::command_executor::SafeCommandExecutor;
use crate::security::credential_store::mask_secrets;
use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use lazy_static::lazy_static;
use secrecy::ExposeSecret;
use std::path::Path;
use std::process::Output;

const GIT: &str = "git";

lazy_static! {
    static ref AUTH_MARKERS: AhoCorasick = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build([
            "authentication failed",
            "invalid username or password",
            "could not read username",
            "could not read password",
            "terminal prompts disabled",
            "permission denied (publickey",
            "the requested url returned error: 403",
            "the requested url returned error: 401",
        ])
        .expect("static auth patterns");
    static ref TRANSPORT_MARKERS: AhoCorasick = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build([
            "could not resolve host",
            "connection refused",
            "connection timed out",
            "operation timed out",
            "network is unreachable",
            "failed to connect",
            "unable to access",
            "could not read from remote repository",
            "early eof",
        ])
        .expect("static transport patterns");
}

/// Rough category of a failed network command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    Transport,
    Other,
}

/// Classify git's stderr; authentication wins over transport since git
/// reports both for a rejected ssh key.
pub fn classify_failure(stderr: &str) -> FailureKind {
    if AUTH_MARKERS.is_match(stderr) {
        FailureKind::Authentication
    } else if TRANSPORT_MARKERS.is_match(stderr) {
        FailureKind::Transport
    } else {
        FailureKind::Other
    }
}

/// `git` command-line backend for one working tree
#[derive(Debug, Clone)]
pub struct GitCli {
    executor: SafeCommandExecutor,
}

impl GitCli {
    pub fn new(executor: SafeCommandExecutor) -> Self {
        Self { executor }
    }

    fn working_dir(&self) -> &Path {
        self.executor.working_dir()
    }

    async fn run(&self, stage: PipelineStage, args: &[&str]) -> Result<Output, PublishError> {
        self.executor
            .execute(GIT, args)
            .await
            .map_err(|e| e.into_publish_error(stage))
    }

    /// Run and require success, returning trimmed stdout
    async fn run_ok(&self, stage: PipelineStage, args: &[&str]) -> Result<String, PublishError> {
        let output = self.run(stage, args).await?;
        if !output.status.success() {
            return Err(PublishError::CommandFailed {
                stage,
                command: describe(args),
                message: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a command that may talk to the remote
    ///
    /// Token auth materializes a prompt responder for this call only;
    /// credential helpers are disabled so nothing is cached.
    async fn run_network(
        &self,
        stage: PipelineStage,
        args: &[&str],
        auth: &NetworkAuth,
    ) -> Result<Output, PublishError> {
        let mut full_args = vec!["-c", "credential.helper="];
        full_args.extend_from_slice(args);

        match auth {
            NetworkAuth::Transport => self.run(stage, &full_args).await,
            NetworkAuth::Token { username, token } => {
                let responder = PromptResponder::materialize()
                    .map_err(|e| io_err(stage, std::env::temp_dir(), e))?;

                let result = self
                    .executor
                    .execute_with_env(
                        GIT,
                        &full_args,
                        &responder.env(username, token.expose_secret()),
                    )
                    .await
                    .map_err(|e| e.into_publish_error(stage));

                if let Err(e) = responder.close() {
                    tracing::warn!(error = %e, "could not remove credential responder");
                }

                let mut output = result?;
                output.stderr = mask_secrets(&String::from_utf8_lossy(&output.stderr), &[token])
                    .into_bytes();
                Ok(output)
            }
        }
    }

    /// Map a failed network command to the matching error
    fn network_error(stage: PipelineStage, args: &[&str], output: &Output) -> PublishError {
        let message = stderr_of(output);
        match classify_failure(&message) {
            FailureKind::Authentication => PublishError::AuthenticationFailure { stage, message },
            FailureKind::Transport => PublishError::TransportFailure { stage, message },
            FailureKind::Other => PublishError::CommandFailed {
                stage,
                command: describe(args),
                message,
            },
        }
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, PublishError> {
        let reference = format!("refs/heads/{}", branch);
        let output = self
            .run(PipelineStage::Branch, &["rev-parse", "--verify", "-q", &reference])
            .await?;
        Ok(output.status.success())
    }

    fn rebase_in_progress(&self) -> bool {
        let git_dir = self.working_dir().join(".git");
        git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn is_repository(&self) -> Result<bool, PublishError> {
        Ok(self.working_dir().join(".git").exists())
    }

    async fn init(&self) -> Result<(), PublishError> {
        self.run_ok(PipelineStage::Bootstrap, &["init", "-q"]).await?;
        Ok(())
    }

    async fn has_commits(&self) -> Result<bool, PublishError> {
        let output = self
            .run(PipelineStage::Branch, &["rev-parse", "--verify", "-q", "HEAD"])
            .await?;
        Ok(output.status.success())
    }

    async fn current_branch(&self) -> Result<Option<String>, PublishError> {
        let output = self
            .run(PipelineStage::Branch, &["symbolic-ref", "-q", "--short", "HEAD"])
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(branch).filter(|b| !b.is_empty()))
    }

    async fn rename_branch(&self, from: &str, to: &str) -> Result<(), PublishError> {
        if self.branch_exists(to).await? {
            return Err(PublishError::BranchConflict {
                branch: to.to_string(),
                message: format!("the current branch is {} but {} already exists", from, to),
            });
        }
        self.run_ok(PipelineStage::Branch, &["branch", "-m", from, to])
            .await?;
        Ok(())
    }

    async fn point_head(&self, branch: &str) -> Result<(), PublishError> {
        let target = format!("refs/heads/{}", branch);
        self.run_ok(PipelineStage::Branch, &["symbolic-ref", "HEAD", &target])
            .await?;
        Ok(())
    }

    async fn attach_head(&self, branch: &str) -> Result<(), PublishError> {
        if self.branch_exists(branch).await? {
            let tip = format!("refs/heads/{}", branch);
            let args = ["merge-base", "--is-ancestor", tip.as_str(), "HEAD"];
            let output = self.run(PipelineStage::Branch, &args).await?;
            match output.status.code() {
                Some(0) => {}
                Some(1) => {
                    return Err(PublishError::BranchConflict {
                        branch: branch.to_string(),
                        message: format!(
                            "HEAD is detached and {} holds commits HEAD does not contain",
                            branch
                        ),
                    });
                }
                _ => {
                    return Err(PublishError::CommandFailed {
                        stage: PipelineStage::Branch,
                        command: describe(&args),
                        message: stderr_of(&output),
                    });
                }
            }
        }

        // Resets the branch to HEAD; the working tree is left as it is
        self.run_ok(PipelineStage::Branch, &["checkout", "-q", "-B", branch])
            .await?;
        Ok(())
    }

    async fn remote_url(&self, remote: &str) -> Result<Option<String>, PublishError> {
        let key = format!("remote.{}.url", remote);
        let args = ["config", "--get", key.as_str()];
        let output = self.run(PipelineStage::Remote, &args).await?;

        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            // git config exits 1 when the key is not set
            Some(1) => Ok(None),
            _ => Err(PublishError::CommandFailed {
                stage: PipelineStage::Remote,
                command: describe(&args),
                message: stderr_of(&output),
            }),
        }
    }

    async fn add_remote(&self, remote: &str, url: &str) -> Result<(), PublishError> {
        self.run_ok(PipelineStage::Remote, &["remote", "add", remote, url])
            .await?;
        Ok(())
    }

    async fn has_upstream(&self) -> Result<bool, PublishError> {
        let output = self
            .run(
                PipelineStage::Commit,
                &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
            )
            .await?;
        Ok(output.status.success())
    }

    async fn set_upstream(&self, remote: &str, branch: &str) -> Result<(), PublishError> {
        let upstream = format!("--set-upstream-to={}/{}", remote, branch);
        self.run_ok(PipelineStage::Reconcile, &["branch", &upstream, branch])
            .await?;
        Ok(())
    }

    async fn remote_branch_exists(
        &self,
        remote: &str,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<bool, PublishError> {
        let reference = format!("refs/heads/{}", branch);
        let args = ["ls-remote", "--exit-code", "--heads", remote, reference.as_str()];
        let output = self
            .run_network(PipelineStage::Reconcile, &args, auth)
            .await?;

        match output.status.code() {
            Some(0) => Ok(true),
            // --exit-code: 2 means no matching ref
            Some(2) => Ok(false),
            _ => Err(Self::network_error(PipelineStage::Reconcile, &args, &output)),
        }
    }

    async fn pull_rebase(
        &self,
        remote: &str,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<(), PublishError> {
        let args = ["pull", "--rebase", "--autostash", remote, branch];
        let output = self
            .run_network(PipelineStage::Reconcile, &args, auth)
            .await?;

        if output.status.success() {
            return Ok(());
        }

        if self.rebase_in_progress() {
            tracing::warn!("aborting failed rebase");
            self.run_ok(PipelineStage::Reconcile, &["rebase", "--abort"])
                .await?;
        }

        let message = stderr_of(&output);
        Err(match classify_failure(&message) {
            FailureKind::Authentication => PublishError::AuthenticationFailure {
                stage: PipelineStage::Reconcile,
                message,
            },
            FailureKind::Transport => PublishError::TransportFailure {
                stage: PipelineStage::Reconcile,
                message,
            },
            FailureKind::Other => PublishError::ReconciliationConflict { message },
        })
    }

    async fn stage_all(&self) -> Result<(), PublishError> {
        self.run_ok(PipelineStage::Staging, &["add", "-A"]).await?;
        Ok(())
    }

    async fn unstage(&self, path: &str) -> Result<(), PublishError> {
        // Without HEAD there is nothing to reset to; dropping the entry is
        // the same thing
        let args = if self.has_commits().await? {
            vec!["reset", "-q", "--", path]
        } else {
            vec!["rm", "--cached", "-q", "--ignore-unmatch", "--", path]
        };
        self.run_ok(PipelineStage::Staging, &args).await?;
        Ok(())
    }

    async fn is_tracked(&self, path: &str) -> Result<bool, PublishError> {
        let output = self
            .run(
                PipelineStage::Staging,
                &["ls-files", "--error-unmatch", "--", path],
            )
            .await?;
        Ok(output.status.success())
    }

    async fn remove_from_index(&self, path: &str) -> Result<(), PublishError> {
        self.run_ok(
            PipelineStage::Staging,
            &["rm", "--cached", "-f", "-q", "--ignore-unmatch", "--", path],
        )
        .await?;
        Ok(())
    }

    async fn staged_paths(&self) -> Result<Vec<String>, PublishError> {
        let output = self
            .run_ok(PipelineStage::Staging, &["diff", "--cached", "--name-only", "-z"])
            .await?;
        Ok(output
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn commit(&self, message: &str) -> Result<(), PublishError> {
        self.run_ok(PipelineStage::Commit, &["commit", "-q", "-m", message])
            .await?;
        Ok(())
    }

    async fn amend(&self, message: &str) -> Result<(), PublishError> {
        self.run_ok(
            PipelineStage::Commit,
            &["commit", "-q", "--amend", "-m", message],
        )
        .await?;
        Ok(())
    }

    async fn push(
        &self,
        remote: &str,
        branch: &str,
        auth: &NetworkAuth,
    ) -> Result<(), PublishError> {
        let args = ["push", "-u", remote, branch];
        let output = self.run_network(PipelineStage::Push, &args, auth).await?;

        if !output.status.success() {
            return Err(Self::network_error(PipelineStage::Push, &args, &output));
        }

        tracing::info!(remote, branch, output = %stderr_of(&output), "pushed");
        Ok(())
    }
}

fn describe(args: &[&str]) -> String {
    format!("{} {}", GIT, args.join(" "))
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
