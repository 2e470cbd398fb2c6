//! Artifact-review backend driving `web-ext sign`

use crate::core::config::ConfigEnum;
use crate::core::error::PublishError;
use crate::core::state_machine::PipelineStage;
use crate::core::traits::{SubmissionClient, SubmissionOutcome, SubmissionRequest, SubmissionStatus};
use crate::security::command_executor::{CommandError, SafeCommandExecutor};
use crate::security::credential_store::mask_secrets;
use async_trait::async_trait;
use secrecy::ExposeSecret;

const WEB_EXT: &str = "web-ext";

/// Environment variable web-ext reads the API key from
pub const API_KEY_VAR: &str = "WEB_EXT_API_KEY";

/// Environment variable web-ext reads the API secret from
pub const API_SECRET_VAR: &str = "WEB_EXT_API_SECRET";

/// Submits the source directory for review with `web-ext sign`
#[derive(Debug, Clone)]
pub struct WebExtClient {
    executor: SafeCommandExecutor,
}

impl WebExtClient {
    pub fn new(executor: SafeCommandExecutor) -> Self {
        Self { executor }
    }

    /// Command-line arguments for one submission, secrets excluded
    pub fn arguments(request: &SubmissionRequest) -> Vec<String> {
        let mut args = vec![
            "sign".to_string(),
            "--no-input".to_string(),
            format!("--channel={}", request.channel.as_str()),
            "--source-dir".to_string(),
            request.source_dir.display().to_string(),
            "--artifacts-dir".to_string(),
            request.artifacts_dir.display().to_string(),
            "--amo-metadata".to_string(),
            request.metadata_file.display().to_string(),
        ];

        if !request.exclusions.is_empty() {
            args.push("--ignore-files".to_string());
            args.extend(request.exclusions.iter().cloned());
        }

        args
    }
}

#[async_trait]
impl SubmissionClient for WebExtClient {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, PublishError> {
        let args = Self::arguments(request);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let envs = [
            (API_KEY_VAR, request.api_key.expose_secret()),
            (API_SECRET_VAR, request.api_secret.expose_secret()),
        ];

        tracing::info!(channel = request.channel.as_str(), "submitting for review");

        let output = match self.executor.execute_with_env(WEB_EXT, &args, &envs).await {
            Ok(output) => output,
            Err(CommandError::NotFound(command)) => {
                return Err(PublishError::DependencyMissing {
                    stage: PipelineStage::Submission,
                    command,
                });
            }
            Err(e) => {
                return Err(PublishError::SubmissionError {
                    message: e.to_string(),
                });
            }
        };

        let secrets = [&request.api_key, &request.api_secret];
        let detail = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout).trim(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        let detail = mask_secrets(detail.trim(), &secrets);

        let status = match output.status.code() {
            Some(0) => SubmissionStatus::Accepted,
            Some(_) => SubmissionStatus::Rejected,
            // Terminated by a signal
            None => SubmissionStatus::Error,
        };

        Ok(SubmissionOutcome {
            channel: request.channel,
            status,
            detail: Some(detail).filter(|d| !d.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Channel;
    use secrecy::SecretString;
    use std::path::PathBuf;

    fn request(exclusions: &[&str]) -> SubmissionRequest {
        SubmissionRequest {
            source_dir: PathBuf::from("/work/addon"),
            artifacts_dir: PathBuf::from("/work/addon/web-ext-artifacts"),
            metadata_file: PathBuf::from("/work/addon/amo-metadata.json"),
            channel: Channel::Listed,
            exclusions: exclusions.iter().map(|s| s.to_string()).collect(),
            api_key: SecretString::from("user:12345:67"),
            api_secret: SecretString::from("0123456789abcdef0123456789abcdef"),
        }
    }

    #[test]
    fn test_arguments_carry_channel_and_paths() {
        let args = WebExtClient::arguments(&request(&["publish.sh", "github_token.txt"]));

        assert_eq!(args[0], "sign");
        assert!(args.contains(&"--channel=listed".to_string()));

        let ignore_at = args.iter().position(|a| a == "--ignore-files").unwrap();
        assert_eq!(&args[ignore_at + 1..], &["publish.sh", "github_token.txt"]);

        let metadata_at = args.iter().position(|a| a == "--amo-metadata").unwrap();
        assert_eq!(args[metadata_at + 1], "/work/addon/amo-metadata.json");
    }

    #[test]
    fn test_arguments_never_contain_secrets() {
        let args = WebExtClient::arguments(&request(&["publish.sh"])).join(" ");
        assert!(!args.contains("user:12345:67"));
        assert!(!args.contains("0123456789abcdef"));
    }

    #[test]
    fn test_no_ignore_flag_without_exclusions() {
        let args = WebExtClient::arguments(&request(&[]));
        assert!(!args.iter().any(|a| a == "--ignore-files"));
    }
}
