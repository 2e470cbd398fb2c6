pub mod backends;
pub mod core;
pub mod orchestration;
pub mod pipeline;
pub mod security;
pub mod telemetry;

pub use crate::core::*;
pub use orchestration::{PublishReport, RepoPublisher};
pub use security::{
    CommandError, CredentialStore, Credentials, SafeCommandExecutor, SensitiveFileGuard,
    SensitivePathSet,
};
