//! Value model shared by every engine layer
//!
//! `Value` is a closed sum type over the shapes found in overlay files.
//! Mappings are insertion-ordered and keyed by strings: YAML keys that are
//! not strings are stringified on load.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::Number;

/// Ordered string-keyed mapping
pub type Mapping = IndexMap<String, Value>;

/// Variable environment used as substitution context
pub type Variables = Mapping;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Mapping(Mapping),
    Sequence(Vec<Value>),
}

/// True if `s` still carries `<<...>>` placeholder syntax.
pub fn has_placeholder(s: &str) -> bool {
    match s.find("<<") {
        Some(start) => s[start + 2..].contains(">>"),
        None => false,
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Look up `key` if this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// A string value that still contains a placeholder.
    pub fn is_unresolved(&self) -> bool {
        self.as_str().is_some_and(has_placeholder)
    }

    /// Text form used when a value is spliced into a larger string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Mapping(_) | Value::Sequence(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Loose equality used by conditional checks: both sides compared as text.
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.to_display_string() == other.to_display_string()
    }

    /// Membership test for sequences, loose equality otherwise.
    pub fn matches_expected(&self, expected: &Value) -> bool {
        match expected {
            Value::Sequence(items) => items.iter().any(|item| self.loose_eq(item)),
            other => self.loose_eq(other),
        }
    }

    /// Interpret a check operand as a boolean (`true`, `"True"`, `"false"`...).
    pub fn truthy_flag(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => other.to_display_string().eq_ignore_ascii_case("true"),
        }
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => Value::from(other).to_display_string(),
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(raw: serde_yaml::Value) -> Self {
        match raw {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => Value::Number(n),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_to_string(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Ok(Value::from(raw))
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Mapping(m) => m.serialize(serializer),
            Value::Sequence(s) => s.serialize(serializer),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}
