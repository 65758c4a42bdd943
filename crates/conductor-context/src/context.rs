//! `PipelineContext` — the per-execution scratchpad threaded through a
//! pipeline run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::response_writer::HttpResponseWriter;
use crate::value::Value;

/// Metadata key under which the inbound HTTP request is stashed, when the
/// trigger was an HTTP request.
pub const META_HTTP_REQUEST: &str = "_http_request";
/// Metadata key under which a step's HTTP response writer handle lives.
pub const META_HTTP_RESPONSE_WRITER: &str = "_http_response_writer";
/// Metadata key set once a step has written the HTTP response.
pub const META_RESPONSE_HANDLED: &str = "_response_handled";
/// Metadata key carrying the execution id for this run.
pub const META_EXECUTION_ID: &str = "_execution_id";

const RESERVED_METADATA_KEYS: &[&str] = &[
    META_HTTP_REQUEST,
    META_HTTP_RESPONSE_WRITER,
    META_RESPONSE_HANDLED,
    META_EXECUTION_ID,
];

/// Per-execution dataflow object shared by every step in a pipeline run.
#[derive(Clone, Default)]
pub struct PipelineContext {
    step_outputs: BTreeMap<String, Value>,
    current: BTreeMap<String, Value>,
    metadata: BTreeMap<String, Value>,
    response_writer: Option<Arc<dyn HttpResponseWriter>>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("step_outputs", &self.step_outputs)
            .field("current", &self.current)
            .field("metadata", &self.metadata)
            .field("response_writer", &self.response_writer.is_some())
            .finish()
    }
}

impl PipelineContext {
    pub fn new(execution_id: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_EXECUTION_ID.to_string(), Value::from(execution_id.into()));
        Self {
            step_outputs: BTreeMap::new(),
            current: BTreeMap::new(),
            metadata,
            response_writer: None,
        }
    }

    /// Install the HTTP response writer for this run and mark its presence
    /// in metadata so steps can check for it without downcasting.
    pub fn set_response_writer(&mut self, writer: Arc<dyn HttpResponseWriter>) {
        self.response_writer = Some(writer);
        self.metadata
            .insert(META_HTTP_RESPONSE_WRITER.to_string(), Value::Bool(true));
    }

    pub fn response_writer(&self) -> Option<&Arc<dyn HttpResponseWriter>> {
        self.response_writer.as_ref()
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.metadata.get(META_EXECUTION_ID).and_then(Value::as_str)
    }

    /// Merge `output` into `StepOutputs[name]`. Merging is idempotent for the
    /// same `(name, output)` pair: fields already equal to the incoming value
    /// are left untouched, and this is never a destructive overwrite of
    /// fields the new output doesn't mention.
    pub fn merge_step_output(&mut self, name: &str, output: Value) {
        let entry = self
            .step_outputs
            .entry(name.to_string())
            .or_insert_with(Value::object);
        match (entry, output) {
            (Value::Object(existing), Value::Object(new_fields)) => {
                for (k, v) in new_fields {
                    existing.insert(k, v);
                }
            }
            (slot, new_value) => {
                *slot = new_value;
            }
        }
    }

    pub fn step_output(&self, step_name: &str) -> Option<&Value> {
        self.step_outputs.get(step_name)
    }

    pub fn step_outputs(&self) -> &BTreeMap<String, Value> {
        &self.step_outputs
    }

    pub fn current(&self) -> &BTreeMap<String, Value> {
        &self.current
    }

    pub fn set_current(&mut self, field: impl Into<String>, value: Value) {
        self.current.insert(field.into(), value);
    }

    pub fn get_current(&self, field: &str) -> Option<&Value> {
        self.current.get(field)
    }

    /// Set a user-defined metadata key. Reserved keys may only be set via
    /// their dedicated accessors.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "refusing to overwrite reserved metadata key via set_metadata");
            return;
        }
        self.metadata.insert(key, value);
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn set_reserved(&mut self, key: &'static str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    pub fn mark_response_handled(&mut self) {
        self.metadata
            .insert(META_RESPONSE_HANDLED.to_string(), Value::Bool(true));
    }

    pub fn response_handled(&self) -> bool {
        matches!(
            self.metadata.get(META_RESPONSE_HANDLED),
            Some(Value::Bool(true))
        )
    }

    /// Resolve a root-qualified dotted path (`steps.<name>.<field>`,
    /// `current.<field>`, `meta.<field>`) against this context.
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let (root, rest) = path.split_once('.').unwrap_or((path, ""));
        match root {
            "steps" => {
                let (step_name, field_path) = rest.split_once('.').unwrap_or((rest, ""));
                let output = self.step_outputs.get(step_name)?;
                if field_path.is_empty() {
                    Some(output)
                } else {
                    output.get_path(field_path)
                }
            }
            "current" => {
                if rest.is_empty() {
                    None
                } else {
                    let (field, field_path) = rest.split_once('.').unwrap_or((rest, ""));
                    let value = self.current.get(field)?;
                    if field_path.is_empty() {
                        Some(value)
                    } else {
                        value.get_path(field_path)
                    }
                }
            }
            "meta" => {
                if rest.is_empty() {
                    None
                } else {
                    let (field, field_path) = rest.split_once('.').unwrap_or((rest, ""));
                    let value = self.metadata.get(field)?;
                    if field_path.is_empty() {
                        Some(value)
                    } else {
                        value.get_path(field_path)
                    }
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_step_output_is_idempotent_and_additive() {
        let mut pc = PipelineContext::new("exec-1");
        let mut m = std::collections::BTreeMap::new();
        m.insert("rows".to_string(), Value::from(vec![Value::from(1i64)]));
        pc.merge_step_output("list", Value::Object(m.clone()));
        pc.merge_step_output("list", Value::Object(m));

        let mut extra = std::collections::BTreeMap::new();
        extra.insert("count".to_string(), Value::from(1i64));
        pc.merge_step_output("list", Value::Object(extra));

        let out = pc.step_output("list").unwrap();
        assert_eq!(out.get_path("rows.0"), Some(&Value::from(1i64)));
        assert_eq!(out.get_path("count"), Some(&Value::from(1i64)));
    }

    #[test]
    fn resolve_path_covers_all_three_roots() {
        let mut pc = PipelineContext::new("exec-1");
        pc.merge_step_output("list", {
            let mut m = std::collections::BTreeMap::new();
            m.insert("count".to_string(), Value::from(2i64));
            Value::Object(m)
        });
        pc.set_current("item", Value::from("x"));

        assert_eq!(pc.resolve_path("steps.list.count"), Some(&Value::from(2i64)));
        assert_eq!(pc.resolve_path("current.item"), Some(&Value::from("x")));
        assert_eq!(
            pc.resolve_path("meta._execution_id"),
            Some(&Value::from("exec-1"))
        );
        assert_eq!(pc.resolve_path("steps.missing.field"), None);
    }

    #[test]
    fn reserved_metadata_keys_reject_user_writes() {
        let mut pc = PipelineContext::new("exec-1");
        pc.set_metadata(META_EXECUTION_ID, Value::from("hijacked"));
        assert_eq!(pc.execution_id(), Some("exec-1"));
    }
}
