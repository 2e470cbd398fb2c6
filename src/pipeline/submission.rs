//! Submission gate
//!
//! The current tree is submitted for review before anything is committed or
//! pushed. A submission that is not accepted stops the run with the
//! staging area untouched.

use crate::core::config::{CONFIG_FILENAME, PublishConfig};
use crate::core::error::{PublishError, io_err};
use crate::core::state_machine::PipelineStage;
use crate::core::traits::{SubmissionClient, SubmissionOutcome, SubmissionRequest};
use crate::security::credential_store::Credentials;
use crate::security::sensitive_guard::{GIT_IGNORE_FILE, SensitivePathSet, ensure_ignore_entries};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// Ignore file read by the submission tool
pub const SUBMISSION_IGNORE_FILE: &str = ".web-extignore";

/// Documentation and store assets that do not belong in the artifact
pub const DOCUMENTATION_PATTERNS: &[&str] = &["docs", "docs/**", "screenshots", "screenshots/**", "*.md"];

#[derive(Debug, Serialize)]
struct VersionMetadata {
    license: &'static str,
}

/// Metadata document written when none exists
#[derive(Debug, Serialize)]
struct DefaultMetadata {
    categories: BTreeMap<&'static str, Vec<&'static str>>,
    summary: BTreeMap<&'static str, String>,
    version: VersionMetadata,
}

impl DefaultMetadata {
    fn new(name: &str) -> Self {
        Self {
            categories: BTreeMap::from([("firefox", vec!["other"])]),
            summary: BTreeMap::from([("en-US", name.to_string())]),
            version: VersionMetadata {
                license: "all-rights-reserved",
            },
        }
    }
}

/// Everything excluded from the submitted artifact
///
/// Starts from the sensitive set, so it always covers it.
pub fn exclusions(sensitive: &SensitivePathSet, config: &PublishConfig) -> Vec<String> {
    let artifacts = config.artifacts_dir.trim_end_matches('/');
    let mut patterns: Vec<String> = sensitive.paths().to_vec();

    let extra = [
        artifacts.to_string(),
        format!("{}/**", artifacts),
        config.metadata_file.clone(),
        CONFIG_FILENAME.to_string(),
        SUBMISSION_IGNORE_FILE.to_string(),
        GIT_IGNORE_FILE.to_string(),
    ];

    for pattern in extra
        .into_iter()
        .chain(DOCUMENTATION_PATTERNS.iter().map(|p| p.to_string()))
    {
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }

    patterns
}

pub struct SubmissionGate<'a> {
    client: &'a dyn SubmissionClient,
    config: &'a PublishConfig,
    sensitive: &'a SensitivePathSet,
}

impl<'a> SubmissionGate<'a> {
    pub fn new(
        client: &'a dyn SubmissionClient,
        config: &'a PublishConfig,
        sensitive: &'a SensitivePathSet,
    ) -> Self {
        Self {
            client,
            config,
            sensitive,
        }
    }

    /// Submit the tree and require acceptance
    pub async fn run(&self, credentials: &Credentials) -> Result<SubmissionOutcome, PublishError> {
        let source_dir = &self.config.source_dir;
        let exclusions = exclusions(self.sensitive, self.config);

        ensure_ignore_entries(
            &source_dir.join(SUBMISSION_IGNORE_FILE),
            &exclusions,
            PipelineStage::Submission,
        )
        .await?;

        let metadata_file = source_dir.join(&self.config.metadata_file);
        self.ensure_metadata(&metadata_file).await?;

        let request = SubmissionRequest {
            source_dir: source_dir.clone(),
            artifacts_dir: source_dir.join(&self.config.artifacts_dir),
            metadata_file,
            channel: self.config.channel,
            exclusions,
            api_key: copy_secret(&credentials.submission_key),
            api_secret: copy_secret(&credentials.submission_secret),
        };

        let outcome = self.client.submit(&request).await?;
        if let Some(detail) = &outcome.detail {
            tracing::debug!(status = ?outcome.status, detail = %detail, "submission finished");
        }
        outcome.into_result()
    }

    async fn ensure_metadata(&self, path: &Path) -> Result<(), PublishError> {
        match fs::try_exists(path).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => return Err(io_err(PipelineStage::Submission, path, e)),
        }

        let document = serde_json::to_string_pretty(&DefaultMetadata::new(&self.config.repo_name))
            .map_err(|e| PublishError::SubmissionError {
                message: format!("could not render metadata: {}", e),
            })?;

        fs::write(path, format!("{}\n", document))
            .await
            .map_err(|e| io_err(PipelineStage::Submission, path, e))?;

        println!("📝 Created default metadata {}", path.display());
        Ok(())
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
