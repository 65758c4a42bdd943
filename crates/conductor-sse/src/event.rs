//! `SSEEvent` — the wire-level record fanned out to subscribers.

use serde::{Deserialize, Serialize};

/// All fields are strings; `data` is already JSON-encoded when non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SSEEvent {
    pub id: String,
    pub event: String,
    pub data: String,
}

impl SSEEvent {
    pub fn new(id: impl Into<String>, event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event: event.into(),
            data: data.into(),
        }
    }

    /// Render in the exact wire format: `id: …\nevent: …\ndata: …\n\n`. If
    /// `data` is empty, the whole event is JSON-encoded as `data`.
    pub fn to_wire(&self) -> String {
        if self.data.is_empty() {
            let whole = serde_json::json!({"id": self.id, "event": self.event});
            format!("id: {}\nevent: {}\ndata: {}\n\n", self.id, self.event, whole)
        } else {
            format!("id: {}\nevent: {}\ndata: {}\n\n", self.id, self.event, self.data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_matches_exact_layout() {
        let event = SSEEvent::new("exec-1", "step.started", r#"{"step":"a"}"#);
        assert_eq!(
            event.to_wire(),
            "id: exec-1\nevent: step.started\ndata: {\"step\":\"a\"}\n\n"
        );
    }

    #[test]
    fn empty_data_falls_back_to_json_encoded_whole_event() {
        let event = SSEEvent::new("exec-1", "step.started", "");
        let wire = event.to_wire();
        assert!(wire.contains("\"id\":\"exec-1\""));
        assert!(wire.contains("\"event\":\"step.started\""));
    }
}
