//! Dynamically-typed value used throughout a pipeline execution.
//!
//! Step output is, by design, an untyped JSON-compatible mapping (see the
//! "Dynamic typing" design note). `Value` models that as a tagged variant
//! rather than forcing every step to share a concrete result schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A JSON-compatible value with dotted-path access helpers.
///
/// `Object` is a `BTreeMap` (not a `HashMap`) so serialized output and
/// template resolution are deterministic across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(a) => serde_json::Value::Array(a.into_iter().map(Into::into).collect()),
            Value::Object(o) => serde_json::Value::Object(
                o.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(_) | Value::Object(_) => {
                let json: serde_json::Value = self.clone().into();
                write!(f, "{json}")
            }
        }
    }
}

impl Value {
    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Look up a dotted path (`"field.nested.0"`) against this value.
    /// Missing intermediate segments resolve to `None`, never an error.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            if segment.is_empty() {
                continue;
            }
            current = match current {
                Value::Object(m) => m.get(segment)?,
                Value::Array(a) => {
                    let idx: usize = segment.parse().ok()?;
                    a.get(idx)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Insert a value at `field` in this object, creating the object if needed.
    pub fn insert_field(&mut self, field: impl Into<String>, value: Value) {
        if !matches!(self, Value::Object(_)) {
            *self = Value::object();
        }
        if let Value::Object(m) = self {
            m.insert(field.into(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_path_walks_nested_objects() {
        let mut root = Value::object();
        let mut inner = Value::object();
        inner.insert_field("id", Value::from("c1"));
        root.insert_field("rows", Value::Array(vec![inner]));

        assert_eq!(
            root.get_path("rows.0.id"),
            Some(&Value::String("c1".to_string()))
        );
        assert_eq!(root.get_path("rows.5.id"), None);
        assert_eq!(root.get_path("missing.path"), None);
    }

    #[test]
    fn json_roundtrip_preserves_shape() {
        let json = serde_json::json!({"a": 1, "b": [true, null, "x"]});
        let v: Value = json.clone().into();
        let back: serde_json::Value = v.into();
        assert_eq!(json, back);
    }

    #[test]
    fn display_renders_scalars_without_quotes() {
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::from(42i64).to_string(), "42");
        assert_eq!(Value::Null.to_string(), "");
    }
}
