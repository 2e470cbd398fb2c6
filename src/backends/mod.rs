//! Production implementations of the pipeline capabilities

pub mod git_cli;
pub mod github;
pub mod web_ext;

pub use git_cli::GitCli;
pub use github::GitHubHost;
pub use web_ext::WebExtClient;
