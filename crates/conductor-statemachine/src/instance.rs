//! `WorkflowInstance` — the runtime record of one state-machine session.

use chrono::{DateTime, Utc};
use conductor_context::Value;

#[derive(Debug, Clone)]
pub struct WorkflowInstance {
    pub id: String,
    pub workflow_type: String,
    pub current_state: String,
    pub previous_state: String,
    pub data: Value,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub completed: bool,
    pub error: bool,
    /// Name of the transition that most recently moved this instance
    /// forward. Used by `RecoverProcessingInstances` to know which
    /// transition to re-trigger after rolling `CurrentState` back.
    pub last_transition: Option<String>,
}

impl WorkflowInstance {
    pub fn new(id: impl Into<String>, workflow_type: impl Into<String>, initial_state: impl Into<String>, data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            workflow_type: workflow_type.into(),
            current_state: initial_state.into(),
            previous_state: String::new(),
            data,
            start_time: now,
            last_updated: now,
            completed: false,
            error: false,
            last_transition: None,
        }
    }
}
