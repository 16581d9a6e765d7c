use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle event emitted while an orchestration run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Unique event ID
    pub id: String,
    /// Run this event belongs to
    pub run_id: String,
    /// Position of the event within its run, starting at 0
    pub sequence: u64,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// What happened
    #[serde(flatten)]
    pub kind: RunEventKind,
}

impl RunEvent {
    pub fn new(run_id: &str, sequence: u64, kind: RunEventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            sequence,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Name of the delegation tool, for start and end events.
    pub fn tool_name(&self) -> Option<&str> {
        match &self.kind {
            RunEventKind::DelegationStarted { tool_name, .. }
            | RunEventKind::DelegationEnded { tool_name, .. } => Some(tool_name),
            RunEventKind::FinalAnswer { .. } => None,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self.kind, RunEventKind::FinalAnswer { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEventKind {
    /// The coordinator handed a task to a specialist
    DelegationStarted {
        tool_name: String,
        args: serde_json::Value,
    },
    /// The specialist returned, or its failure was turned into text
    DelegationEnded {
        tool_name: String,
        output: String,
        success: bool,
    },
    /// The coordinator produced its final synthesis
    FinalAnswer { text: String },
}
