//! Orchestration layer
//!
//! Sequences the pipeline stages for one publishing run.

pub mod publisher;

pub use publisher::{PublishReport, RepoPublisher};
