//! Value Payload
//!
//! The store is value-polymorphic: atoms and computed cells hold an opaque
//! payload spanning primitives and structured data without a closed set of
//! native kinds.
//!
//! # Copy vs. Share Semantics
//!
//! Reading a cell clones its `Value`, and cloning follows the variant:
//!
//! - Scalar variants (`Null`, `Bool`, `Number`, `Text`) are copied. Mutating
//!   the caller's copy cannot affect the cell's stored state.
//! - `Structured` payloads are shared by reference: the clone is a new `Arc`
//!   handle to the same underlying JSON tree. Callers that need to know
//!   whether two values share storage can ask via [`Value::shares_storage`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A dynamically typed payload stored in an atom or computed cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// The absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// An owned string, copied on read.
    Text(String),
    /// An object or array payload, shared by reference on read.
    Structured(Arc<serde_json::Value>),
}

impl Value {
    /// Wrap a structured JSON payload.
    pub fn structured(value: serde_json::Value) -> Self {
        Value::Structured(Arc::new(value))
    }

    /// True if this is the null variant.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The numeric payload, if this is a `Number`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The structured payload, if this is a `Structured`.
    pub fn as_structured(&self) -> Option<&Arc<serde_json::Value>> {
        match self {
            Value::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// True if both values are structured and point at the same storage.
    ///
    /// Scalar variants never share storage; they compare by value only.
    pub fn shares_storage(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Structured(a), Value::Structured(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<serde_json::Value> for Value {
    /// Scalar JSON maps onto the scalar variants; arrays and objects become
    /// shared `Structured` payloads.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            structured => Value::Structured(Arc::new(structured)),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Structured(v) => v.as_ref().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_clone_is_independent() {
        let original = Value::from("hello");
        let mut copy = original.clone();

        if let Value::Text(s) = &mut copy {
            s.push_str(" world");
        }

        assert_eq!(original.as_text(), Some("hello"));
        assert_eq!(copy.as_text(), Some("hello world"));
    }

    #[test]
    fn structured_clone_shares_storage() {
        let original = Value::structured(json!({"items": [1, 2, 3]}));
        let copy = original.clone();

        assert!(original.shares_storage(&copy));
        assert_eq!(original, copy);
    }

    #[test]
    fn scalars_never_share_storage() {
        let a = Value::from(1.0);
        let b = a.clone();
        assert!(!a.shares_storage(&b));
    }

    #[test]
    fn json_conversion_round_trips() {
        let value = Value::from(json!({"a": 1}));
        assert!(matches!(value, Value::Structured(_)));

        let back: serde_json::Value = (&value).into();
        assert_eq!(back, json!({"a": 1}));

        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(true)), Value::Bool(true));
        assert_eq!(Value::from(json!(2.5)), Value::Number(2.5));
        assert_eq!(Value::from(json!("s")), Value::Text("s".into()));
    }

    #[test]
    fn serde_round_trip() {
        let value = Value::structured(json!({"nested": {"k": [true, null]}}));
        let encoded = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }
}
