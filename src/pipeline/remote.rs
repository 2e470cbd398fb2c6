//! Remote resolution
//!
//! The local `origin` must point at the canonical URL. An existing remote
//! with any other URL is a conflict the operator fixes by hand; it is never
//! repointed.

use crate::core::config::REMOTE_NAME;
use crate::core::error::PublishError;
use crate::core::traits::{RemoteHost, RemoteIdentity, RepoCreation, VersionControl};
use serde::Serialize;

/// How the remote was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteResolution {
    /// `origin` already pointed at the canonical URL
    Existing,
    /// Repository created on the host, then `origin` added
    Created,
    /// Repository already existed on the host, `origin` added
    Adopted,
}

pub struct RemoteResolver<'a> {
    vcs: &'a dyn VersionControl,
    host: &'a dyn RemoteHost,
}

impl<'a> RemoteResolver<'a> {
    pub fn new(vcs: &'a dyn VersionControl, host: &'a dyn RemoteHost) -> Self {
        Self { vcs, host }
    }

    pub async fn resolve(&self, identity: &RemoteIdentity) -> Result<RemoteResolution, PublishError> {
        if let Some(existing) = self.vcs.remote_url(REMOTE_NAME).await? {
            if existing != identity.url {
                return Err(PublishError::RemoteConfigConflict {
                    existing,
                    expected: identity.url.clone(),
                });
            }
            tracing::debug!(url = %existing, "remote already configured");
            return Ok(RemoteResolution::Existing);
        }

        let resolution = match self.host.create_repository(&identity.repo_name).await? {
            RepoCreation::Created => RemoteResolution::Created,
            RepoCreation::AlreadyExists => RemoteResolution::Adopted,
        };

        self.vcs.add_remote(REMOTE_NAME, &identity.url).await?;
        tracing::info!(url = %identity.url, ?resolution, "remote added");
        Ok(resolution)
    }
}
