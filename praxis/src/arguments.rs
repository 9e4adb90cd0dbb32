//! Dynamically typed argument bags for tool and agent inputs.
//!
//! [`Arguments`] is a string-keyed map of JSON values. Every stored value is
//! a `serde_json::Value`, so the whole bag is JSON-serializable by
//! construction and round-trips losslessly through typed structs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::AgentError;

/// A JSON-object bag of named arguments.
///
/// # Example
///
/// ```rust,ignore
/// let mut args = Arguments::new();
/// args.insert("city", "Tokyo")?;
/// let city: String = args.get("city").unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(BTreeMap<String, Value>);

impl Arguments {
    /// Create an empty argument bag.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a bag from a JSON value, which must be an object.
    ///
    /// String values holding serialized objects are tolerated, matching the
    /// looser argument encodings some providers emit.
    pub fn from_value(value: Value) -> Result<Self, AgentError> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            Value::Null => Ok(Self::new()),
            Value::String(s) => {
                let inner: Value = serde_json::from_str(&s)
                    .map_err(|e| AgentError::parsing(s.clone(), e.to_string()))?;
                match inner {
                    Value::Object(map) => Ok(Self(map.into_iter().collect())),
                    other => Err(AgentError::parsing(
                        other.to_string(),
                        "arguments must be a JSON object",
                    )),
                }
            }
            other => Err(AgentError::parsing(
                other.to_string(),
                "arguments must be a JSON object",
            )),
        }
    }

    /// Build a bag from any serializable struct via a JSON round-trip.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, AgentError> {
        Self::from_value(serde_json::to_value(value)?)
    }

    /// Insert a value under `key`, serializing it to JSON.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<(), AgentError> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Insert an already-encoded JSON value under `key`.
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Fluent variant of [`insert`](Self::insert) for building bags inline.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.0.insert(key.into(), v);
        }
        self
    }

    /// Extract a typed value for `key`, if present and convertible.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Borrow the raw JSON value for `key`.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Extract a string value for `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether the bag contains `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove and return the value for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Number of arguments in the bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Render the whole bag as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    /// Decode the whole bag into a typed struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, AgentError> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl FromIterator<(String, Value)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Search {
        query: String,
        limit: u32,
    }

    #[test]
    fn struct_roundtrip() {
        let input = Search {
            query: "rust executors".into(),
            limit: 5,
        };
        let args = Arguments::from_serialize(&input).expect("from struct");
        assert_eq!(args.get_str("query"), Some("rust executors"));
        assert_eq!(args.get::<u32>("limit"), Some(5));

        let back: Search = args.parse().expect("to struct");
        assert_eq!(back, input);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Arguments::from_value(Value::Array(vec![])).is_err());
        assert!(Arguments::from_value(Value::Bool(true)).is_err());
    }

    #[test]
    fn from_value_accepts_null_and_stringified_objects() {
        assert!(Arguments::from_value(Value::Null).expect("null").is_empty());

        let args =
            Arguments::from_value(Value::String(r#"{"a": 1}"#.into())).expect("string object");
        assert_eq!(args.get::<i64>("a"), Some(1));
    }

    #[test]
    fn insert_and_remove() {
        let mut args = Arguments::new();
        args.insert("flag", true).expect("insert");
        assert!(args.contains("flag"));
        assert_eq!(args.remove("flag"), Some(Value::Bool(true)));
        assert!(args.is_empty());
    }

    #[test]
    fn serde_is_transparent() {
        let args = Arguments::new().with("k", "v");
        let json = serde_json::to_string(&args).expect("serialize");
        assert_eq!(json, r#"{"k":"v"}"#);
        let back: Arguments = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, args);
    }
}
