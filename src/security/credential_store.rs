//! Credential store with memory-safe handling and masking capabilities
//!
//! Each secret is resolved exactly once per run, from its environment
//! variable or from the first value line of a local file named after it.
//! Values are held as `secrecy::SecretString` so they cannot end up in logs
//! by accident, and are never written back into the repository.

use crate::core::error::{PublishError, io_err};
use crate::core::state_machine::PipelineStage;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const BOM: char = '\u{feff}';

/// Where a secret comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretSpec {
    /// Environment variable consulted first
    pub env_var: &'static str,
    /// Fallback file in the source directory
    pub file_name: &'static str,
    /// Human description used in the placeholder file
    pub description: &'static str,
}

/// Source-control access token
pub const SCM_TOKEN: SecretSpec = SecretSpec {
    env_var: "GITHUB_TOKEN",
    file_name: "github_token.txt",
    description: "hosting service personal access token (repo scope)",
};

/// Artifact-submission API key
pub const SUBMISSION_KEY: SecretSpec = SecretSpec {
    env_var: "WEB_EXT_API_KEY",
    file_name: "amo_api_key.txt",
    description: "add-on submission API key (JWT issuer)",
};

/// Artifact-submission API secret
pub const SUBMISSION_SECRET: SecretSpec = SecretSpec {
    env_var: "WEB_EXT_API_SECRET",
    file_name: "amo_api_secret.txt",
    description: "add-on submission API secret (JWT secret)",
};

/// Every secret a run needs
pub const SECRET_SPECS: &[SecretSpec] = &[SCM_TOKEN, SUBMISSION_KEY, SUBMISSION_SECRET];

/// Resolved secrets for one run
#[derive(Debug)]
pub struct Credentials {
    pub scm_token: SecretString,
    pub submission_key: SecretString,
    pub submission_secret: SecretString,
}

impl Credentials {
    /// Masks every known secret in a string
    ///
    /// Used on subprocess output and response bodies before they are shown
    /// to the operator.
    pub fn mask(&self, text: &str) -> String {
        mask_secrets(
            text,
            &[
                &self.scm_token,
                &self.submission_key,
                &self.submission_secret,
            ],
        )
    }
}

/// Replaces every occurrence of each secret with its masked form
pub fn mask_secrets(text: &str, secrets: &[&SecretString]) -> String {
    let mut masked = text.to_string();

    for secret in secrets {
        let value = secret.expose_secret();
        if value.is_empty() {
            continue;
        }
        if let Ok(regex) = Regex::new(&regex::escape(value)) {
            let masked_value = mask_token(value);
            masked = regex
                .replace_all(&masked, regex::NoExpand(masked_value.as_str()))
                .to_string();
        }
    }

    masked
}

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use repo_publisher::security::credential_store::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Resolves secrets from the environment or local secret files
pub struct CredentialStore {
    base_dir: PathBuf,
    env: HashMap<String, String>,
}

impl CredentialStore {
    /// Creates a store reading files from `base_dir`
    pub fn new<P: AsRef<Path>>(base_dir: P, env: HashMap<String, String>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            env,
        }
    }

    /// Path of the local file for a secret
    pub fn file_path(&self, spec: &SecretSpec) -> PathBuf {
        self.base_dir.join(spec.file_name)
    }

    /// Resolves one secret
    ///
    /// The environment variable wins when non-empty. Otherwise the first
    /// non-empty, non-comment line of the secret file is used, with a UTF-8
    /// BOM stripped. A missing file is replaced by a placeholder with
    /// instructions and the secret is reported missing; an existing file is
    /// never overwritten.
    pub async fn resolve(&self, spec: &SecretSpec) -> Result<SecretString, PublishError> {
        if let Some(value) = self
            .env
            .get(spec.env_var)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
        {
            tracing::debug!(secret = spec.env_var, "resolved from environment");
            return Ok(SecretString::from(value.to_string()));
        }

        let path = self.file_path(spec);
        let missing = || PublishError::CredentialMissing {
            name: spec.env_var.to_string(),
            path: path.clone(),
        };

        match fs::read_to_string(&path).await {
            Ok(content) => match first_value(&content) {
                Some(value) => {
                    tracing::debug!(secret = spec.env_var, file = spec.file_name, "resolved from file");
                    Ok(SecretString::from(value.to_string()))
                }
                None => Err(missing()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.write_placeholder(spec, &path).await?;
                Err(missing())
            }
            Err(e) => Err(io_err(PipelineStage::Credentials, &path, e)),
        }
    }

    /// Resolves every secret a run needs
    ///
    /// All missing secrets get their placeholder before the first missing
    /// one is reported.
    pub async fn resolve_all(&self) -> Result<Credentials, PublishError> {
        let scm_token = self.resolve(&SCM_TOKEN).await;
        let submission_key = self.resolve(&SUBMISSION_KEY).await;
        let submission_secret = self.resolve(&SUBMISSION_SECRET).await;

        Ok(Credentials {
            scm_token: scm_token?,
            submission_key: submission_key?,
            submission_secret: submission_secret?,
        })
    }

    async fn write_placeholder(&self, spec: &SecretSpec, path: &Path) -> Result<(), PublishError> {
        let content = format!(
            "# Paste your {} on the first line that does not start with '#'.\n\
             # Alternatively export {} in the environment.\n\
             # This file is excluded from commits and submissions.\n",
            spec.description, spec.env_var
        );

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(io_err(PipelineStage::Credentials, path, e)),
        };
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| io_err(PipelineStage::Credentials, path, e))?;

        println!("⚠️  Created placeholder {}", path.display());
        Ok(())
    }
}

/// First non-empty, non-comment line, BOM stripped
fn first_value(content: &str) -> Option<&str> {
    content
        .trim_start_matches(BOM)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
}
