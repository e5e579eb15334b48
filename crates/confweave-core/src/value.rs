//! Preprocessed configuration value types
//!
//! Represents the tree produced by the preprocessor. Values can be scalars
//! (string, int, float, bool, null, timestamp), sequences, or ordered
//! mappings with string keys. Two transient variants, [`IncludeRef`] and
//! [`SecretRef`], exist only between parsing and reference resolution and
//! never appear in the tree returned by a successful load.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use std::fmt;

/// A reference produced by an `!include` tag, replaced by the included
/// file's preprocessed content during reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeRef {
    /// File name, resolved against the including file's directory.
    pub file_name: String,
    /// The full variable environment the included file inherits: the active
    /// environment at the reference site overlaid with the include's own
    /// `vars` entries (the include's entries win).
    pub vars: IndexMap<String, String>,
}

/// A reference produced by a `!secret` tag, replaced by the named entry of
/// the sibling `secrets.yaml` during reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretRef {
    /// Name of the secret to look up.
    pub name: String,
}

/// A preprocessed configuration value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Timestamp value
    Timestamp(DateTime<FixedOffset>),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values, in insertion order
    Mapping(IndexMap<String, Value>),
    /// Transient `!include` reference
    IncludeRef(IncludeRef),
    /// Transient `!secret` reference
    SecretRef(SecretRef),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a boolean
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Check if this value is an integer
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    /// Check if this value is a float
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Check if this value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as timestamp if this is a Timestamp
    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Safe descent through a chain of mapping keys.
    ///
    /// Returns `None` if any step is missing or traverses a value that is
    /// not a mapping. An empty key list returns `self`.
    pub fn get_nested(&self, keys: &[&str]) -> Option<&Value> {
        let mut current = self;
        for key in keys {
            current = current.as_mapping()?.get(*key)?;
        }
        Some(current)
    }

    /// The natural string form of a scalar value, used when coercing
    /// variable definitions and mapping keys. Non-scalar values (sequences,
    /// mappings, nulls, transient references) have no string form.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Timestamp(t) => Some(t.to_rfc3339()),
            _ => None,
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::IncludeRef(_) => "include reference",
            Value::SecretRef(_) => "secret reference",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::IncludeRef(r) => write!(f, "!include {}", r.file_name),
            Value::SecretRef(r) => write!(f, "!secret {}", r.name),
        }
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        let mut level2 = IndexMap::new();
        level2.insert("leaf".into(), Value::String("value".into()));
        let mut level1 = IndexMap::new();
        level1.insert("level2".into(), Value::Mapping(level2));
        level1.insert("port".into(), Value::Integer(5432));
        let mut root = IndexMap::new();
        root.insert("level1".into(), Value::Mapping(level1));
        Value::Mapping(root)
    }

    #[test]
    fn test_get_nested() {
        let value = sample();
        assert_eq!(
            value
                .get_nested(&["level1", "level2", "leaf"])
                .and_then(Value::as_str),
            Some("value")
        );
        assert_eq!(
            value.get_nested(&["level1", "port"]).and_then(Value::as_i64),
            Some(5432)
        );
    }

    #[test]
    fn test_get_nested_missing_step() {
        let value = sample();
        assert!(value.get_nested(&["level1", "nope", "leaf"]).is_none());
        assert!(value.get_nested(&["level1", "level2", "nope"]).is_none());
    }

    #[test]
    fn test_get_nested_through_non_mapping() {
        let value = sample();
        // "port" is an integer, descending further must not panic
        assert!(value.get_nested(&["level1", "port", "leaf"]).is_none());
    }

    #[test]
    fn test_get_nested_empty_keys() {
        let value = sample();
        assert_eq!(value.get_nested(&[]), Some(&value));
    }

    #[test]
    fn test_value_type_checks() {
        assert!(Value::Null.is_null());
        assert!(Value::Bool(true).is_bool());
        assert!(Value::Integer(42).is_integer());
        assert!(Value::Float(2.5).is_float());
        assert!(Value::String("hello".into()).is_string());
        assert!(Value::Sequence(vec![]).is_sequence());
        assert!(Value::Mapping(IndexMap::new()).is_mapping());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_i64(), Some(42));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Integer(42).as_f64(), Some(42.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
    }

    #[test]
    fn test_scalar_string() {
        assert_eq!(Value::Bool(false).scalar_string(), Some("false".into()));
        assert_eq!(Value::Integer(7).scalar_string(), Some("7".into()));
        assert_eq!(Value::String("x".into()).scalar_string(), Some("x".into()));
        assert_eq!(Value::Null.scalar_string(), None);
        assert_eq!(Value::Sequence(vec![]).scalar_string(), None);
        assert_eq!(Value::Mapping(IndexMap::new()).scalar_string(), None);
    }

    #[test]
    fn test_display_mapping() {
        let value = sample();
        assert_eq!(
            value.to_string(),
            "{level1: {level2: {leaf: value}, port: 5432}}"
        );
    }
}
