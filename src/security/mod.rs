pub mod askpass;
pub mod command_executor;
pub mod credential_store;
pub mod sensitive_guard;

pub use askpass::PromptResponder;
pub use command_executor::{CommandError, SafeCommandExecutor};
pub use credential_store::{CredentialStore, Credentials, SecretSpec, mask_secrets, mask_token};
pub use sensitive_guard::{SensitiveFileGuard, SensitivePathSet};
