//! Pipeline stages
//!
//! Each stage borrows the capabilities it needs and performs one step of a
//! run. Stages do not call each other; `orchestration` sequences them.

pub mod branch;
pub mod commit;
pub mod push;
pub mod reconcile;
pub mod remote;
pub mod submission;

pub use branch::{BranchAction, BranchNormalizer, BranchOutcome};
pub use commit::{CommitAction, CommitPolicy};
pub use push::{PushExecutor, PushOutcome};
pub use reconcile::{HistoryReconciler, ReconcileOutcome, ReconcileState};
pub use remote::{RemoteResolution, RemoteResolver};
pub use submission::SubmissionGate;
