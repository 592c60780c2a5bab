//! Ordered, dynamically-typed string-keyed map used for request bodies,
//! instance data, and handler payloads.
//!
//! Typed accessors return [`MapStrError`] on a missing key or a type
//! mismatch instead of panicking, so call sites stay schema-less but safe.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors returned by the typed accessors of [`MapStr`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapStrError {
    #[error("the key '{key}' is not found")]
    NotFound { key: String },
    #[error("the value of '{key}' is {actual}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Ordered mapping from string keys to JSON values.
///
/// Insertion order is preserved for serialization (`serde_json` is built
/// with `preserve_order`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapStr(Map<String, Value>);

impl MapStr {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Inserts or replaces `key`, returning `self` for chaining.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Copies every entry of `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: &MapStr) -> &mut Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the string value of `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent, `TypeMismatch` if the value
    /// is not a JSON string.
    pub fn get_str(&self, key: &str) -> Result<&str, MapStrError> {
        let value = self.required(key)?;
        value
            .as_str()
            .ok_or_else(|| mismatch(key, "string", value))
    }

    /// Returns the integer value of `key`.
    ///
    /// Numeric strings (as produced by path parameters) are accepted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent, `TypeMismatch` if the value
    /// is neither an integer nor a string holding one.
    pub fn get_i64(&self, key: &str) -> Result<i64, MapStrError> {
        let value = self.required(key)?;
        match value {
            Value::Number(n) => n.as_i64().ok_or_else(|| mismatch(key, "integer", value)),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| mismatch(key, "integer", value)),
            _ => Err(mismatch(key, "integer", value)),
        }
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `TypeMismatch` as for [`MapStr::get_i64`].
    pub fn get_f64(&self, key: &str) -> Result<f64, MapStrError> {
        let value = self.required(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "number", value))
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `TypeMismatch` as for [`MapStr::get_i64`].
    pub fn get_bool(&self, key: &str) -> Result<bool, MapStrError> {
        let value = self.required(key)?;
        value.as_bool().ok_or_else(|| mismatch(key, "bool", value))
    }

    /// Returns a nested object as a new `MapStr`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `TypeMismatch` as for [`MapStr::get_i64`].
    pub fn get_map_str(&self, key: &str) -> Result<MapStr, MapStrError> {
        let value = self.required(key)?;
        value
            .as_object()
            .map(|m| MapStr(m.clone()))
            .ok_or_else(|| mismatch(key, "object", value))
    }

    /// Returns an array of objects as a list of `MapStr`.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value is not an array or any element is
    /// not an object.
    pub fn get_map_str_array(&self, key: &str) -> Result<Vec<MapStr>, MapStrError> {
        let value = self.required(key)?;
        let items = value
            .as_array()
            .ok_or_else(|| mismatch(key, "array", value))?;
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .map(|m| MapStr(m.clone()))
                    .ok_or_else(|| mismatch(key, "array of objects", item))
            })
            .collect()
    }

    /// Consumes the map, returning the underlying JSON object.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn required(&self, key: &str) -> Result<&Value, MapStrError> {
        self.0.get(key).ok_or_else(|| MapStrError::NotFound {
            key: key.to_string(),
        })
    }
}

impl From<Map<String, Value>> for MapStr {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<MapStr> for Value {
    fn from(map: MapStr) -> Self {
        Value::Object(map.0)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapStr {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn mismatch(key: &str, expected: &'static str, value: &Value) -> MapStrError {
    MapStrError::TypeMismatch {
        key: key.to_string(),
        expected,
        actual: kind_of(value),
    }
}

/// Human-readable JSON kind, used in mismatch messages.
#[must_use]
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
