//! Stage tracking for a single publishing run
//!
//! The record lives in memory only. Repository state is re-derived on every
//! invocation, so nothing here is ever persisted or resumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Publishing pipeline stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Initial,
    Credentials,
    Bootstrap,
    Branch,
    Remote,
    Reconcile,
    Submission,
    Staging,
    Commit,
    Push,
    Success,
    Failed,
}

impl PipelineStage {
    /// Get string representation of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Initial => "configuration",
            PipelineStage::Credentials => "credentials",
            PipelineStage::Bootstrap => "bootstrap",
            PipelineStage::Branch => "branch",
            PipelineStage::Remote => "remote",
            PipelineStage::Reconcile => "reconcile",
            PipelineStage::Submission => "submission",
            PipelineStage::Staging => "staging",
            PipelineStage::Commit => "commit",
            PipelineStage::Push => "push",
            PipelineStage::Success => "success",
            PipelineStage::Failed => "failed",
        }
    }

    /// Terminal stages end the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Success | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTransition {
    /// From stage
    pub from: PipelineStage,

    /// To stage
    pub to: PipelineStage,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Short note (e.g. the failing error code)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// In-memory record of the stages a run went through
#[derive(Debug)]
pub struct PipelineStateMachine {
    current: PipelineStage,
    transitions: Vec<StageTransition>,
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStateMachine {
    /// Create a new state machine
    pub fn new() -> Self {
        Self {
            current: PipelineStage::Initial,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new stage
    ///
    /// Transitions out of a terminal stage are ignored.
    pub fn transition(&mut self, to: PipelineStage, note: Option<String>) {
        if self.current.is_terminal() {
            tracing::warn!(from = %self.current, to = %to, "ignoring transition out of terminal stage");
            return;
        }

        tracing::debug!(from = %self.current, to = %to, "stage transition");
        self.transitions.push(StageTransition {
            from: self.current,
            to,
            timestamp: Utc::now(),
            note,
        });
        self.current = to;
    }

    /// Mark the run as failed at the current stage
    pub fn fail(&mut self, code: &str) {
        self.transition(PipelineStage::Failed, Some(code.to_string()));
    }

    /// Get current stage
    pub fn stage(&self) -> PipelineStage {
        self.current
    }

    /// Get recorded transitions
    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    /// Get transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let note = t
                    .note
                    .as_ref()
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default();
                format!("{}: {} → {}{}", t.timestamp.to_rfc3339(), t.from, t.to, note)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_machine() {
        let machine = PipelineStateMachine::new();

        assert_eq!(machine.stage(), PipelineStage::Initial);
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn test_transition() {
        let mut machine = PipelineStateMachine::new();
        machine.transition(PipelineStage::Credentials, None);
        machine.transition(PipelineStage::Branch, None);

        assert_eq!(machine.stage(), PipelineStage::Branch);
        assert_eq!(machine.transitions().len(), 2);
        assert_eq!(machine.transitions()[1].from, PipelineStage::Credentials);
    }

    #[test]
    fn test_terminal_stage_is_sticky() {
        let mut machine = PipelineStateMachine::new();
        machine.transition(PipelineStage::Submission, None);
        machine.fail("SUBMISSION_REJECTED");
        machine.transition(PipelineStage::Push, None);

        assert_eq!(machine.stage(), PipelineStage::Failed);
        assert_eq!(machine.transitions().len(), 2);
        assert_eq!(
            machine.transitions()[1].note.as_deref(),
            Some("SUBMISSION_REJECTED")
        );
    }

    #[test]
    fn test_history() {
        let mut machine = PipelineStateMachine::new();
        machine.transition(PipelineStage::Credentials, None);
        machine.transition(PipelineStage::Branch, None);

        let history = machine.history();
        assert!(history.contains("configuration → credentials"));
        assert!(history.contains("credentials → branch"));
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&PipelineStage::Reconcile).unwrap();
        assert_eq!(json, r#""RECONCILE""#);
    }
}
