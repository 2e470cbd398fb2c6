//! Sensitive file guard
//!
//! Staging starts from "add everything", so anything that must never be
//! published (credential files, the wrapper script) is pulled back out of
//! the index afterwards. The guard also keeps ignore files listing every
//! sensitive pattern.

use crate::core::config::PublishConfig;
use crate::core::error::{PublishError, io_err};
use crate::core::state_machine::PipelineStage;
use crate::core::traits::VersionControl;
use crate::security::credential_store::SECRET_SPECS;
use std::path::Path;
use tokio::fs;

/// Version-control ignore file
pub const GIT_IGNORE_FILE: &str = ".gitignore";

/// Paths that must never appear in a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitivePathSet {
    paths: Vec<String>,
}

impl SensitivePathSet {
    /// Wrapper script plus every credential file
    pub fn new(script_name: &str) -> Self {
        let mut paths = vec![script_name.to_string()];
        for spec in SECRET_SPECS {
            if !paths.iter().any(|p| p == spec.file_name) {
                paths.push(spec.file_name.to_string());
            }
        }
        Self { paths }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(&config.script_name)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// Removes sensitive paths from the staging set
pub struct SensitiveFileGuard<'a> {
    sensitive: &'a SensitivePathSet,
}

impl<'a> SensitiveFileGuard<'a> {
    pub fn new(sensitive: &'a SensitivePathSet) -> Self {
        Self { sensitive }
    }

    /// Make sure `.gitignore` lists every sensitive path and the
    /// submission artifacts directory
    pub async fn ensure_ignored(
        &self,
        source_dir: &Path,
        artifacts_dir: &str,
    ) -> Result<Vec<String>, PublishError> {
        let mut patterns = self.sensitive.paths().to_vec();
        let artifacts = artifacts_dir.trim_end_matches('/');
        if !artifacts.is_empty() {
            patterns.push(format!("{}/", artifacts));
        }

        ensure_ignore_entries(
            &source_dir.join(GIT_IGNORE_FILE),
            &patterns,
            PipelineStage::Staging,
        )
        .await
    }

    /// Stage everything, then pull every sensitive path back out
    ///
    /// Returns the staged paths. Running this twice yields the same set.
    pub async fn stage(&self, vcs: &dyn VersionControl) -> Result<Vec<String>, PublishError> {
        vcs.stage_all().await?;

        // Backends report "nothing staged" and "not tracked" as success,
        // so any error here is real.
        for path in self.sensitive.paths() {
            vcs.unstage(path).await?;
            if vcs.is_tracked(path).await? {
                vcs.remove_from_index(path).await?;
            }
        }

        for path in self.sensitive.paths() {
            if vcs.is_tracked(path).await? {
                return Err(PublishError::SensitivePathStaged { path: path.clone() });
            }
        }

        let staged = vcs.staged_paths().await?;
        tracing::debug!(count = staged.len(), "staged after guard");
        Ok(staged)
    }
}

/// Append every missing pattern to an ignore file
///
/// Returns the patterns that were added. The file is created if absent and
/// left untouched when nothing is missing.
pub async fn ensure_ignore_entries(
    path: &Path,
    patterns: &[String],
    stage: PipelineStage,
) -> Result<Vec<String>, PublishError> {
    let existing = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_err(stage, path, e)),
    };

    let added = missing_entries(&existing, patterns);
    if added.is_empty() {
        return Ok(added);
    }

    fs::write(path, append_entries(&existing, &added))
        .await
        .map_err(|e| io_err(stage, path, e))?;

    tracing::info!(file = %path.display(), added = ?added, "updated ignore file");
    Ok(added)
}

/// Patterns not yet present as a line of `existing`
fn missing_entries(existing: &str, patterns: &[String]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        let present = existing.lines().any(|line| line.trim() == pattern)
            || missing.iter().any(|m| m == pattern);
        if !present {
            missing.push(pattern.to_string());
        }
    }
    missing
}

/// `existing` followed by one newline-terminated line per entry
fn append_entries(existing: &str, entries: &[String]) -> String {
    let mut content = existing.to_string();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for entry in entries {
        content.push_str(entry);
        content.push('\n');
    }
    content
}
