//! Single-use credential-prompt responder
//!
//! Git asks `GIT_ASKPASS` for a username and a password when an https remote
//! needs authentication. The responder is a tiny script that echoes values
//! from its own environment; the token is handed to the child process
//! through that environment and is never written to disk. The script file is
//! removed when the responder is dropped, whatever the outcome of the call.

use std::io::{self, Write};
use std::path::Path;
use tempfile::TempPath;

/// Variable the responder answers username prompts from
pub const USERNAME_VAR: &str = "REPO_PUBLISHER_ASKPASS_USERNAME";

/// Variable the responder answers password prompts from
pub const TOKEN_VAR: &str = "REPO_PUBLISHER_ASKPASS_TOKEN";

const SCRIPT: &str = r#"#!/bin/sh
case "$1" in
    [Uu]sername*) printf '%s\n' "$REPO_PUBLISHER_ASKPASS_USERNAME" ;;
    *) printf '%s\n' "$REPO_PUBLISHER_ASKPASS_TOKEN" ;;
esac
"#;

/// Transient responder script, deleted on drop
#[derive(Debug)]
pub struct PromptResponder {
    path: TempPath,
    program: String,
}

impl PromptResponder {
    /// Write the responder script to a fresh temp file
    pub fn materialize() -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("repo-publisher-askpass-")
            .suffix(".sh")
            .tempfile()?;
        file.write_all(SCRIPT.as_bytes())?;
        file.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o700))?;
        }

        // Close the handle so the script can be executed
        let path = file.into_temp_path();
        let program = path
            .to_str()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "non UTF-8 temp path"))?
            .to_string();

        tracing::debug!(path = %program, "credential responder materialized");
        Ok(Self { path, program })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Environment for the single child process that may prompt
    pub fn env<'a>(&'a self, username: &'a str, token: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("GIT_ASKPASS", self.program.as_str()),
            ("GIT_TERMINAL_PROMPT", "0"),
            (USERNAME_VAR, username),
            (TOKEN_VAR, token),
        ]
    }

    /// Delete the script now, reporting any failure
    pub fn close(self) -> io::Result<()> {
        tracing::debug!(path = %self.program, "credential responder removed");
        self.path.close()
    }
}
