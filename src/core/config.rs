//! Configuration structures and types for repo-publisher
//!
//! `PublishConfig` is built once by the config loader and then only read.
//! Every enum-typed option has a closed set of accepted spellings; anything
//! else is rejected instead of silently defaulted.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Canonical branch every repository is normalized to
pub const CANONICAL_BRANCH: &str = "main";

/// The single remote this tool manages
pub const REMOTE_NAME: &str = "origin";

/// Message used for every generated commit
pub const COMMIT_MESSAGE: &str = "Publish update";

/// Optional project configuration file, looked up in the source directory
pub const CONFIG_FILENAME: &str = ".repo-publish.yaml";

/// Enum-typed configuration value with a closed set of spellings
pub trait ConfigEnum: Sized + Copy + PartialEq + 'static {
    /// Accepted spellings, in the order they are listed to the operator
    const VARIANTS: &'static [(&'static str, Self)];

    /// Parse a raw value, naming `key` in the error
    fn parse(key: &str, value: &str) -> Result<Self, PublishError> {
        let trimmed = value.trim();
        Self::VARIANTS
            .iter()
            .find(|(name, _)| *name == trimmed)
            .map(|(_, variant)| *variant)
            .ok_or_else(|| PublishError::InvalidConfiguration {
                key: key.to_string(),
                value: value.to_string(),
                expected: Self::VARIANTS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Canonical spelling of this value
    fn as_str(&self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(_, variant)| variant == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

/// Remote transport
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Https,
    Ssh,
}

impl ConfigEnum for Protocol {
    const VARIANTS: &'static [(&'static str, Self)] =
        &[("https", Protocol::Https), ("ssh", Protocol::Ssh)];
}

/// Review channel for the artifact submission
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Listed,
    #[default]
    Unlisted,
}

impl ConfigEnum for Channel {
    const VARIANTS: &'static [(&'static str, Self)] =
        &[("listed", Channel::Listed), ("unlisted", Channel::Unlisted)];
}

/// What the caller asked the run to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Full pipeline through push
    #[default]
    Publish,
    /// Stop after bringing local history up to date
    Pull,
}

impl ConfigEnum for Action {
    const VARIANTS: &'static [(&'static str, Self)] =
        &[("publish", Action::Publish), ("pull", Action::Pull)];
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ConfigEnum for LogFormat {
    const VARIANTS: &'static [(&'static str, Self)] =
        &[("text", LogFormat::Text), ("json", LogFormat::Json)];
}

/// Project configuration file contents
///
/// Enum options stay strings here so that a bad value in the file is
/// reported as an invalid configuration value, not as a YAML error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_name: Option<String>,
}

/// Resolved, immutable configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PublishConfig {
    /// Repository working directory
    pub source_dir: PathBuf,

    /// Owner (user or organization) of the hosted repository
    pub owner: String,

    pub protocol: Protocol,

    /// Hosting host, e.g. `github.com`
    pub host: String,

    /// REST API base URL
    pub api_url: String,

    /// User part of ssh remote URLs
    pub ssh_user: String,

    /// Hosted repository name
    pub repo_name: String,

    pub channel: Channel,

    /// Submission artifacts directory, relative to the source directory
    pub artifacts_dir: String,

    /// Submission metadata document, relative to the source directory
    pub metadata_file: String,

    /// Wrapper script that launches this tool; never committed
    pub script_name: String,

    pub action: Action,

    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse() {
        assert_eq!(Protocol::parse("PUBLISH_PROTOCOL", "https").unwrap(), Protocol::Https);
        assert_eq!(Protocol::parse("PUBLISH_PROTOCOL", " ssh ").unwrap(), Protocol::Ssh);
    }

    #[test]
    fn test_unknown_value_is_invalid_configuration() {
        let err = Channel::parse("PUBLISH_CHANNEL", "beta").unwrap_err();
        match err {
            PublishError::InvalidConfiguration {
                key,
                value,
                expected,
            } => {
                assert_eq!(key, "PUBLISH_CHANNEL");
                assert_eq!(value, "beta");
                assert_eq!(expected, "listed, unlisted");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!(Protocol::parse("PUBLISH_PROTOCOL", "HTTPS").is_err());
    }

    #[test]
    fn test_as_str_round_trips_variants() {
        assert_eq!(Channel::Listed.as_str(), "listed");
        assert_eq!(Action::Pull.as_str(), "pull");
        assert_eq!(LogFormat::Json.as_str(), "json");
    }

    #[test]
    fn test_file_config_rejects_unknown_fields() {
        let result: Result<FileConfig, _> = serde_yaml::from_str("owner: me\nbranch: dev\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_file_config_camel_case() {
        let config: FileConfig =
            serde_yaml::from_str("owner: me\nrepoName: addon\nartifactsDir: dist\n").unwrap();
        assert_eq!(config.owner.as_deref(), Some("me"));
        assert_eq!(config.repo_name.as_deref(), Some("addon"));
        assert_eq!(config.artifacts_dir.as_deref(), Some("dist"));
    }
}
