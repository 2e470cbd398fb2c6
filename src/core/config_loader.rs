//! Configuration loader with layered sources
//!
//! Priority (high to low):
//! 1. Environment variables
//! 2. Project config (`<source dir>/.repo-publish.yaml`)
//! 3. Default values
//!
//! The environment is passed in as a map so the loader never reads process
//! state directly.

use crate::core::config::{
    Action, CONFIG_FILENAME, Channel, ConfigEnum, FileConfig, LogFormat, Protocol, PublishConfig,
};
use crate::core::error::{PublishError, io_err};
use crate::core::state_machine::PipelineStage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const ENV_SOURCE_DIR: &str = "PUBLISH_SOURCE_DIR";
pub const ENV_OWNER: &str = "PUBLISH_OWNER";
pub const ENV_PROTOCOL: &str = "PUBLISH_PROTOCOL";
pub const ENV_HOST: &str = "PUBLISH_HOST";
pub const ENV_API_URL: &str = "PUBLISH_API_URL";
pub const ENV_SSH_USER: &str = "PUBLISH_SSH_USER";
pub const ENV_REPO_NAME: &str = "PUBLISH_REPO_NAME";
pub const ENV_CHANNEL: &str = "PUBLISH_CHANNEL";
pub const ENV_ARTIFACTS_DIR: &str = "PUBLISH_ARTIFACTS_DIR";
pub const ENV_METADATA_FILE: &str = "PUBLISH_METADATA_FILE";
pub const ENV_SCRIPT_NAME: &str = "PUBLISH_SCRIPT_NAME";
pub const ENV_ACTION: &str = "PUBLISH_ACTION";
pub const ENV_LOG_FORMAT: &str = "PUBLISH_LOG_FORMAT";

const DEFAULT_HOST: &str = "github.com";
const DEFAULT_SSH_USER: &str = "git";
const DEFAULT_ARTIFACTS_DIR: &str = "web-ext-artifacts";
const DEFAULT_METADATA_FILE: &str = "amo-metadata.json";
const DEFAULT_SCRIPT_NAME: &str = "publish.sh";

/// Options for loading configuration
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Directory the tool was started in
    pub working_dir: PathBuf,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let env = &options.env;

        let source_dir = match lookup(env, ENV_SOURCE_DIR) {
            Some(dir) => options.working_dir.join(dir),
            None => options.working_dir.clone(),
        };
        let source_dir = fs::canonicalize(&source_dir)
            .await
            .map_err(|e| io_err(PipelineStage::Initial, &source_dir, e))?;

        let file = Self::load_project_config(&source_dir)
            .await?
            .unwrap_or_default();

        let owner = pick(env, ENV_OWNER, file.owner.as_deref()).ok_or_else(|| {
            PublishError::InvalidConfiguration {
                key: ENV_OWNER.to_string(),
                value: String::new(),
                expected: "a non-empty owner name".to_string(),
            }
        })?;

        let protocol = match pick(env, ENV_PROTOCOL, file.protocol.as_deref()) {
            Some(raw) => Protocol::parse(ENV_PROTOCOL, &raw)?,
            None => Protocol::default(),
        };
        let channel = match pick(env, ENV_CHANNEL, file.channel.as_deref()) {
            Some(raw) => Channel::parse(ENV_CHANNEL, &raw)?,
            None => Channel::default(),
        };
        let action = match lookup(env, ENV_ACTION) {
            Some(raw) => Action::parse(ENV_ACTION, raw)?,
            None => Action::default(),
        };
        let log_format = match lookup(env, ENV_LOG_FORMAT) {
            Some(raw) => LogFormat::parse(ENV_LOG_FORMAT, raw)?,
            None => LogFormat::default(),
        };

        let host = pick(env, ENV_HOST, file.host.as_deref())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let api_url = pick(env, ENV_API_URL, file.api_url.as_deref())
            .unwrap_or_else(|| format!("https://api.{}", host));

        let repo_name = match pick(env, ENV_REPO_NAME, file.repo_name.as_deref()) {
            Some(name) => name,
            None => Self::directory_name(&source_dir)?,
        };

        Ok(PublishConfig {
            owner,
            protocol,
            api_url: api_url.trim_end_matches('/').to_string(),
            host,
            ssh_user: pick(env, ENV_SSH_USER, file.ssh_user.as_deref())
                .unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
            repo_name,
            channel,
            artifacts_dir: pick(env, ENV_ARTIFACTS_DIR, file.artifacts_dir.as_deref())
                .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_string()),
            metadata_file: pick(env, ENV_METADATA_FILE, file.metadata_file.as_deref())
                .unwrap_or_else(|| DEFAULT_METADATA_FILE.to_string()),
            script_name: pick(env, ENV_SCRIPT_NAME, file.script_name.as_deref())
                .unwrap_or_else(|| DEFAULT_SCRIPT_NAME.to_string()),
            action,
            log_format,
            source_dir,
        })
    }

    /// Load configuration from the project YAML file, if present
    async fn load_project_config(source_dir: &Path) -> Result<Option<FileConfig>, PublishError> {
        let path = source_dir.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| io_err(PipelineStage::Initial, &path, e))?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let config: FileConfig =
            serde_yaml::from_str(&content).map_err(|e| PublishError::InvalidConfiguration {
                key: CONFIG_FILENAME.to_string(),
                value: e.to_string(),
                expected: "a YAML mapping of known settings".to_string(),
            })?;

        tracing::debug!(path = %path.display(), "loaded project config");
        Ok(Some(config))
    }

    fn directory_name(source_dir: &Path) -> Result<String, PublishError> {
        source_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| PublishError::InvalidConfiguration {
                key: ENV_REPO_NAME.to_string(),
                value: source_dir.display().to_string(),
                expected: "a source directory with a UTF-8 name, or an explicit repo name"
                    .to_string(),
            })
    }
}

/// Non-empty environment value
fn lookup<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Environment value, falling back to the project file value
fn pick(env: &HashMap<String, String>, key: &str, file_value: Option<&str>) -> Option<String> {
    lookup(env, key)
        .or_else(|| file_value.map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_string)
}
