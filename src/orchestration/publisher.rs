//! Repo Publisher - Main orchestrator for a publishing run
//!
//! Sequences the pipeline stages:
//! - Repository bootstrap and branch normalization
//! - Remote resolution and history reconciliation
//! - Review submission, gated before anything is committed
//! - Guarded staging, commit policy and push
//!
//! Stages run strictly in order and the first failure ends the run.

use crate::core::config::{Action, ConfigEnum, PublishConfig};
use crate::core::error::PublishError;
use crate::core::state_machine::{PipelineStage, PipelineStateMachine, StageTransition};
use crate::core::traits::{
    NetworkAuth, RemoteHost, RemoteIdentity, RepositoryState, SubmissionClient, SubmissionOutcome,
    VersionControl,
};
use crate::pipeline::{
    BranchNormalizer, BranchOutcome, CommitAction, CommitPolicy, HistoryReconciler, PushExecutor,
    PushOutcome, ReconcileOutcome, RemoteResolution, RemoteResolver, SubmissionGate,
};
use crate::security::credential_store::Credentials;
use crate::security::sensitive_guard::{SensitiveFileGuard, SensitivePathSet};
use serde::Serialize;
use std::time::Instant;

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub action: Action,
    pub remote_url: String,
    /// Repository was initialized by this run
    pub bootstrapped: bool,
    pub branch: BranchOutcome,
    pub remote: RemoteResolution,
    pub reconcile: ReconcileOutcome,
    pub submission: Option<SubmissionOutcome>,
    /// Paths staged after the sensitive guard ran
    pub staged: Vec<String>,
    pub commit: Option<CommitAction>,
    pub push: Option<PushOutcome>,
    pub history: Vec<StageTransition>,
    pub duration: u64,
}

/// Main publishing orchestrator
pub struct RepoPublisher {
    config: PublishConfig,
    credentials: Credentials,
    vcs: Box<dyn VersionControl>,
    host: Box<dyn RemoteHost>,
    submitter: Box<dyn SubmissionClient>,
    state_machine: PipelineStateMachine,
}

impl RepoPublisher {
    pub fn new(
        config: PublishConfig,
        credentials: Credentials,
        vcs: Box<dyn VersionControl>,
        host: Box<dyn RemoteHost>,
        submitter: Box<dyn SubmissionClient>,
    ) -> Self {
        Self {
            config,
            credentials,
            vcs,
            host,
            submitter,
            state_machine: PipelineStateMachine::new(),
        }
    }

    /// Stage reached so far
    pub fn stage(&self) -> PipelineStage {
        self.state_machine.stage()
    }

    /// Human-readable stage history
    pub fn history(&self) -> String {
        self.state_machine.history()
    }

    /// Mask every credential of this run in `text`
    pub fn mask(&self, text: &str) -> String {
        self.credentials.mask(text)
    }

    /// Run the pipeline once
    pub async fn run(&mut self) -> Result<PublishReport, PublishError> {
        match self.execute().await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.state_machine.fail(e.code());
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<PublishReport, PublishError> {
        let start_time = Instant::now();
        let identity = RemoteIdentity::new(
            self.config.protocol,
            &self.config.host,
            &self.config.owner,
            &self.config.repo_name,
            &self.config.ssh_user,
        );
        let auth = NetworkAuth::for_protocol(
            self.config.protocol,
            &self.config.owner,
            &self.credentials.scm_token,
        );
        let sensitive = SensitivePathSet::from_config(&self.config);

        println!("\n🚀 Publishing {}", self.config.source_dir.display());
        println!("  Remote: {}\n", identity.url);

        // 1. Credentials were resolved before the run started
        self.state_machine
            .transition(PipelineStage::Credentials, Some("resolved".to_string()));

        // 2. Bootstrap
        self.state_machine.transition(PipelineStage::Bootstrap, None);
        let bootstrapped = if self.vcs.is_repository().await? {
            false
        } else {
            self.vcs.init().await?;
            println!("📁 Initialized repository");
            true
        };

        // 3. Branch
        self.state_machine.transition(PipelineStage::Branch, None);
        let branch = BranchNormalizer::new(self.vcs.as_ref()).normalize().await?;
        println!("🌿 Branch: {} ({:?})", branch.branch, branch.action);

        // 4. Remote
        self.state_machine.transition(PipelineStage::Remote, None);
        let remote = RemoteResolver::new(self.vcs.as_ref(), self.host.as_ref())
            .resolve(&identity)
            .await?;
        println!("🔗 Remote: {:?}", remote);

        // 5. Reconcile
        self.state_machine.transition(PipelineStage::Reconcile, None);
        println!("🔄 Reconciling with remote...");
        let reconcile = HistoryReconciler::new(self.vcs.as_ref())
            .reconcile(&branch.branch, &auth)
            .await?;
        match reconcile {
            ReconcileOutcome::FirstPublish => println!("  ✅ First publish, nothing to pull"),
            ReconcileOutcome::Synced => println!("  ✅ Up to date with {}", branch.branch),
        }

        if self.config.action == Action::Pull {
            self.state_machine
                .transition(PipelineStage::Success, Some(Action::Pull.as_str().to_string()));
            println!("\n✅ Pull complete");
            return Ok(self.report(ReportParts {
                remote_url: identity.url,
                bootstrapped,
                branch,
                remote,
                reconcile,
                submission: None,
                staged: Vec::new(),
                commit: None,
                push: None,
                start_time,
            }));
        }

        // 6. Submission
        self.state_machine.transition(PipelineStage::Submission, None);
        println!(
            "📤 Submitting for review ({} channel)...",
            self.config.channel.as_str()
        );
        let submission =
            SubmissionGate::new(self.submitter.as_ref(), &self.config, &sensitive)
                .run(&self.credentials)
                .await?;
        println!("  ✅ Submission accepted");

        // 7. Staging
        self.state_machine.transition(PipelineStage::Staging, None);
        let guard = SensitiveFileGuard::new(&sensitive);
        guard
            .ensure_ignored(&self.config.source_dir, &self.config.artifacts_dir)
            .await?;
        let staged = guard.stage(self.vcs.as_ref()).await?;
        println!("🔒 Staged {} path(s), sensitive files excluded", staged.len());

        // 8. Commit
        self.state_machine.transition(PipelineStage::Commit, None);
        let repository = RepositoryState {
            has_commits: self.vcs.has_commits().await?,
            current_branch: self
                .vcs
                .current_branch()
                .await?
                .unwrap_or_else(|| branch.branch.clone()),
            has_upstream: self.vcs.has_upstream().await?,
            staged_changes: !staged.is_empty(),
        };
        let commit = CommitPolicy::new(self.vcs.as_ref())
            .apply(&repository)
            .await?;
        println!("📝 Commit: {:?}", commit);

        // 9. Push
        self.state_machine.transition(PipelineStage::Push, None);
        let push = PushExecutor::new(self.vcs.as_ref())
            .push(&branch.branch, &auth)
            .await?;
        match push {
            PushOutcome::Pushed => println!("  ✅ Pushed {} to origin", branch.branch),
            PushOutcome::NothingToPush => println!("  ⚠️  Nothing committed yet, push skipped"),
        }

        self.state_machine.transition(PipelineStage::Success, None);
        println!("\n✅ Publish complete");

        Ok(self.report(ReportParts {
            remote_url: identity.url,
            bootstrapped,
            branch,
            remote,
            reconcile,
            submission: Some(submission),
            staged,
            commit: Some(commit),
            push: Some(push),
            start_time,
        }))
    }

    fn report(&self, parts: ReportParts) -> PublishReport {
        PublishReport {
            action: self.config.action,
            remote_url: parts.remote_url,
            bootstrapped: parts.bootstrapped,
            branch: parts.branch,
            remote: parts.remote,
            reconcile: parts.reconcile,
            submission: parts.submission,
            staged: parts.staged,
            commit: parts.commit,
            push: parts.push,
            history: self.state_machine.transitions().to_vec(),
            duration: parts.start_time.elapsed().as_millis() as u64,
        }
    }
}

struct ReportParts {
    remote_url: String,
    bootstrapped: bool,
    branch: BranchOutcome,
    remote: RemoteResolution,
    reconcile: ReconcileOutcome,
    submission: Option<SubmissionOutcome>,
    staged: Vec<String>,
    commit: Option<CommitAction>,
    push: Option<PushOutcome>,
    start_time: Instant,
}
