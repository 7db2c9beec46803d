//! Typed attribute values produced by the coercer.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A coerced value. Serializes to the natural JSON shape: lists become
/// arrays, maps become objects, `Null` becomes `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypedValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<TypedValue>),
    Map(BTreeMap<String, TypedValue>),
}

impl TypedValue {
    pub fn map() -> Self {
        TypedValue::Map(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TypedValue::Float(n) => Some(*n),
            TypedValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, TypedValue>> {
        match self {
            TypedValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Map lookup; `None` for missing keys and non-map values.
    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Append `value` to the list stored under `key`, creating it if needed.
    /// No-op on non-map values.
    pub fn push_child(&mut self, key: &str, value: TypedValue) {
        let TypedValue::Map(map) = self else {
            return;
        };
        match map
            .entry(key.to_string())
            .or_insert_with(|| TypedValue::List(Vec::new()))
        {
            TypedValue::List(items) => items.push(value),
            other => *other = TypedValue::List(vec![std::mem::take(other), value]),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(n: i64) -> Self {
        TypedValue::Int(n)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Bool(b)
    }
}

impl<T: Into<TypedValue>> From<Vec<T>> for TypedValue {
    fn from(items: Vec<T>) -> Self {
        TypedValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TypedValue::Null => serializer.serialize_unit(),
            TypedValue::Bool(b) => serializer.serialize_bool(*b),
            TypedValue::Int(n) => serializer.serialize_i64(*n),
            TypedValue::Float(n) => serializer.serialize_f64(*n),
            TypedValue::String(s) => serializer.serialize_str(s),
            TypedValue::List(items) => serializer.collect_seq(items),
            TypedValue::Map(map) => serializer.collect_map(map),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => f.write_str("null"),
            TypedValue::Bool(b) => write!(f, "{b}"),
            TypedValue::Int(n) => write!(f, "{n}"),
            TypedValue::Float(n) => write!(f, "{n}"),
            TypedValue::String(s) => f.write_str(s),
            TypedValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            TypedValue::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}
