use crate::error::{PorterError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A field that extractors emit either as a single value or as a list.
///
/// Collapsed into an ordered `Vec` at ingestion so no later stage has to
/// care which shape the extractor chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl OneOrMany<Value> {
    /// Classify a JSON value; `null` carries no values at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(OneOrMany::Many(items.clone())),
            other => Some(OneOrMany::One(other.clone())),
        }
    }
}

/// Untyped record as produced by an extractor. Any field may be absent,
/// null or wrong-typed; unknown keys are carried along and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accept any JSON value that is an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(PorterError::Schema(format!(
                "expected a JSON object for a card record, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Non-null value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Scalar text for `key`, trimmed; blank strings count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(scalar_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Collapse a string-or-list field into its truthy terms, in order.
    pub fn terms(&self, key: &str) -> Vec<String> {
        self.get(key).map(terms_from_value).unwrap_or_default()
    }

    /// A gap is a field that is absent, null, a blank string, or an empty
    /// list or object.
    pub fn is_gap(&self, key: &str) -> bool {
        self.0.get(key).map(is_empty_value).unwrap_or(true)
    }

    pub fn name(&self) -> Option<String> {
        self.text("name")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Whether a value carries no information for gap-filling purposes.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Stringify a scalar JSON value. Lists and objects are not scalars.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Scalar text for a value that is truthy in JSON terms: `null`, `false`,
/// `0` and `""` are skipped.
pub fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        other => scalar_text(other),
    }
}

/// Collapse a string-or-list value into its truthy scalar terms.
pub fn terms_from_value(value: &Value) -> Vec<String> {
    OneOrMany::from_value(value)
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .iter()
        .filter_map(truthy_text)
        .collect()
}

/// Lenient integer coercion: integers, integral-looking strings and
/// floats (truncated). Anything else is `None`, never an error.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
