//! `TransitionEvent` — the intended (not-yet-committed) target of a
//! transition, handed to the transition handler before commit.

use chrono::{DateTime, Utc};
use conductor_context::Value;

#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub workflow_id: String,
    pub transition_id: String,
    pub from_state: String,
    pub to_state: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}
