//! Scalar property values
//!
//! Properties are opaque to the store: any JSON scalar is accepted, nothing
//! is interpreted. Structured values (arrays, objects) are rejected at parse
//! time, which sends the whole document down the corrupt-file fallback path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar property value as it appears in the persisted JSON documents.
///
/// Variant order matters: untagged deserialization tries variants top to
/// bottom, giving the decode rule null → bool → number (f64) → string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Explicit JSON null. Pruned on write, so normally only seen in
    /// documents produced by older versions.
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => Ok(()),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}
