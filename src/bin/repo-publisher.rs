//! Repo Publisher CLI
//!
//! Publishes a working directory to its hosted repository after a review
//! submission. Configured entirely through the environment.

use anyhow::{Context, Result};
use clap::Parser;
use repo_publisher::backends::{GitCli, GitHubHost, WebExtClient};
use repo_publisher::core::config::ConfigEnum;
use repo_publisher::core::config_loader::{ConfigLoadOptions, ConfigLoader};
use repo_publisher::core::error::PublishError;
use repo_publisher::orchestration::{PublishReport, RepoPublisher};
use repo_publisher::security::{CredentialStore, SafeCommandExecutor};
use repo_publisher::telemetry::init_tracing;
use std::collections::HashMap;
use std::process;
use tracing::Level;

/// Repository publishing orchestrator
#[derive(Parser)]
#[command(name = "repo-publisher")]
#[command(version)]
#[command(
    about = "Submit a browser extension for review, then commit and push it",
    long_about = "Submit a browser extension for review, then commit and push it.\n\n\
                  Settings come from PUBLISH_* environment variables and an optional \
                  .repo-publish.yaml in the source directory. Secrets come from \
                  GITHUB_TOKEN, WEB_EXT_API_KEY and WEB_EXT_API_SECRET or their local files."
)]
struct Cli {}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let _cli = Cli::parse();

    let env: HashMap<String, String> = std::env::vars().collect();
    let working_dir = std::env::current_dir().context("cannot read the current directory")?;

    let config = match ConfigLoader::load(ConfigLoadOptions {
        working_dir,
        env: env.clone(),
    })
    .await
    {
        Ok(config) => config,
        Err(e) => return Ok(report_failure(&e, &e.to_string())),
    };

    init_tracing(config.log_format, Level::WARN);

    println!("\n📦 repo-publisher\n");
    println!("  Source: {}", config.source_dir.display());
    println!("  Action: {}", config.action.as_str());

    let credentials = match CredentialStore::new(&config.source_dir, env).resolve_all().await {
        Ok(credentials) => credentials,
        Err(e) => return Ok(report_failure(&e, &e.to_string())),
    };

    let executor = SafeCommandExecutor::new(&config.source_dir)
        .with_context(|| format!("cannot run commands in {}", config.source_dir.display()))?;

    let host = match GitHubHost::new(&config.api_url, &credentials.scm_token) {
        Ok(host) => host,
        Err(e) => return Ok(report_failure(&e, &credentials.mask(&e.to_string()))),
    };

    let mut publisher = RepoPublisher::new(
        config,
        credentials,
        Box::new(GitCli::new(executor.clone())),
        Box::new(host),
        Box::new(WebExtClient::new(executor)),
    );

    match publisher.run().await {
        Ok(report) => {
            print_report(&report);
            Ok(0)
        }
        Err(e) => {
            let code = report_failure(&e, &publisher.mask(&e.to_string()));
            eprintln!("\nStage history:");
            for line in publisher.history().lines() {
                eprintln!("  {}", line);
            }
            Ok(code)
        }
    }
}

/// Print the operator diagnostic and return the exit code
fn report_failure(error: &PublishError, message: &str) -> i32 {
    eprintln!("\n❌ Publishing failed at stage '{}'", error.stage());
    eprintln!("  {}", message);
    eprintln!("  Code: {}", error.code());

    let actions = error.suggested_actions();
    if !actions.is_empty() {
        eprintln!("\nSuggested actions:");
        for action in actions {
            eprintln!("  - {}", action);
        }
    }

    1
}

fn print_report(report: &PublishReport) {
    println!("\n📋 Summary");
    println!("  Remote: {} ({:?})", report.remote_url, report.remote);
    println!("  Branch: {}", report.branch.branch);
    println!("  History: {:?}", report.reconcile);
    if let Some(submission) = &report.submission {
        println!("  Submission: {:?} ({})", submission.status, submission.channel.as_str());
    }
    if let Some(commit) = report.commit {
        println!("  Commit: {:?} ({} staged path(s))", commit, report.staged.len());
    }
    if let Some(push) = report.push {
        println!("  Push: {:?}", push);
    }
    println!("  Duration: {}ms", report.duration);
}
