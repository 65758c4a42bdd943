//! Template resolution: `{{ .dotted.path }}` interpolation and
//! `{"_from": "dotted.path"}` typed substitution.
//!
//! Intentionally not a general expression language — no operators, no
//! function calls, no arithmetic. Just path lookups and literal
//! interpolation, per the engine's non-goals.

use crate::context::PipelineContext;
use crate::error::TemplateError;
use crate::value::Value;

const PLACEHOLDER_OPEN: &str = "{{";
const PLACEHOLDER_CLOSE: &str = "}}";
const TYPED_REF_KEY: &str = "_from";

/// Resolves string interpolation and typed-reference templates against a
/// `PipelineContext`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `expr` against `pc`. If `expr` is exactly one placeholder
    /// (`"{{ .a.b }}"` with nothing else around it), the original typed value
    /// is returned. Otherwise every placeholder occurrence is replaced by the
    /// looked-up value's string form (missing paths render as `""`).
    pub fn resolve(&self, expr: &str, pc: &PipelineContext) -> Value {
        match single_placeholder_path(expr) {
            Some(path) => pc.resolve_path(&path).cloned().unwrap_or(Value::Null),
            None => Value::String(self.interpolate(expr, pc)),
        }
    }

    /// Replace every `{{ .path }}` occurrence in `expr` with its string form.
    pub fn interpolate(&self, expr: &str, pc: &PipelineContext) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;
        while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + PLACEHOLDER_OPEN.len()..];
            match after_open.find(PLACEHOLDER_CLOSE) {
                Some(end) => {
                    let path_expr = after_open[..end].trim();
                    let path = path_expr.strip_prefix('.').unwrap_or(path_expr);
                    let resolved = pc.resolve_path(path).cloned().unwrap_or(Value::Null);
                    out.push_str(&resolved.to_string());
                    rest = &after_open[end + PLACEHOLDER_CLOSE.len()..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Walk a config value, replacing any `{"_from": "path"}` mapping wholesale
    /// and interpolating string leaves in-place.
    pub fn resolve_config(&self, config: &Value, pc: &PipelineContext) -> Value {
        match config {
            Value::Object(m) => {
                if m.len() == 1 {
                    if let Some(Value::String(path)) = m.get(TYPED_REF_KEY) {
                        return pc.resolve_path(path).cloned().unwrap_or(Value::Null);
                    }
                }
                let mut resolved = std::collections::BTreeMap::new();
                for (k, v) in m {
                    resolved.insert(k.clone(), self.resolve_config(v, pc));
                }
                Value::Object(resolved)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.resolve_config(v, pc)).collect())
            }
            Value::String(s) => self.resolve(s, pc),
            other => other.clone(),
        }
    }

    /// Reject a SQL-bound query string containing a template placeholder, per
    /// the injection-prevention rule: only declared `params` are
    /// template-resolved, never the query text itself.
    pub fn reject_templated_query(&self, query: &str) -> Result<(), TemplateError> {
        if query.contains(PLACEHOLDER_OPEN) {
            Err(TemplateError::DisallowedTemplate(query.to_string()))
        } else {
            Ok(())
        }
    }
}

/// If `expr` is exactly one `{{ .path }}` placeholder with nothing else
/// around it, return the bare path.
fn single_placeholder_path(expr: &str) -> Option<String> {
    let trimmed = expr.trim();
    let inner = trimmed
        .strip_prefix(PLACEHOLDER_OPEN)?
        .strip_suffix(PLACEHOLDER_CLOSE)?;
    if inner.contains(PLACEHOLDER_OPEN) {
        return None;
    }
    let path_expr = inner.trim();
    Some(path_expr.strip_prefix('.').unwrap_or(path_expr).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_list() -> PipelineContext {
        let mut pc = PipelineContext::new("exec-1");
        let mut rows = Vec::new();
        for id in ["c1", "c2"] {
            let mut row = std::collections::BTreeMap::new();
            row.insert("id".to_string(), Value::from(id));
            rows.push(Value::Object(row));
        }
        let mut list = std::collections::BTreeMap::new();
        list.insert("rows".to_string(), Value::Array(rows));
        list.insert("count".to_string(), Value::from(2i64));
        pc.merge_step_output("list", Value::Object(list));
        pc
    }

    #[test]
    fn whole_placeholder_preserves_type() {
        let pc = context_with_list();
        let engine = TemplateEngine::new();
        let resolved = engine.resolve("{{ .steps.list.count }}", &pc);
        assert_eq!(resolved, Value::from(2i64));
    }

    #[test]
    fn embedded_placeholder_stringifies_and_missing_is_empty() {
        let pc = context_with_list();
        let engine = TemplateEngine::new();
        let resolved = engine.resolve("count={{ .steps.list.count }} missing={{ .steps.x.y }}", &pc);
        assert_eq!(resolved, Value::String("count=2 missing=".to_string()));
    }

    #[test]
    fn typed_from_reference_preserves_sequence_type() {
        let pc = context_with_list();
        let engine = TemplateEngine::new();
        let mut config = std::collections::BTreeMap::new();
        config.insert("_from".to_string(), Value::from("steps.list.rows"));
        let resolved = engine.resolve_config(&Value::Object(config), &pc);
        match resolved {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn rejects_templated_sql_query() {
        let engine = TemplateEngine::new();
        assert!(engine
            .reject_templated_query("SELECT * FROM t WHERE id = {{ .current.id }}")
            .is_err());
        assert!(engine.reject_templated_query("SELECT * FROM t WHERE id = $1").is_ok());
    }
}
