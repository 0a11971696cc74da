//! # Configuration Values
//!
//! Components receive their configuration as an opaque [`ConfigMap`]: a map from
//! string keys to a small set of value kinds. The graph never interprets these
//! values; that is left to each component's `initialize` routine. Query
//! parameters and query results use the same representation.
//!
//! Values are `serde`-compatible (untagged), so a configuration can be written as
//! plain JSON:
//!
//! ```rust
//! use tracegraph::value::{parse_config, Value};
//!
//! let config = parse_config(r#"{ "count": 3, "label": "cpu0", "verbose": true }"#).unwrap();
//! assert_eq!(config.get("count"), Some(&Value::Integer(3)));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configuration map, keyed by parameter name.
pub type ConfigMap = BTreeMap<String, Value>;

/// A single configuration, query parameter or query result value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  /// Boolean flag.
  Bool(bool),
  /// Signed integer.
  Integer(i64),
  /// UTF-8 string.
  String(String),
  /// Nested map.
  Map(ConfigMap),
}

impl Value {
  /// Returns the string payload, if this is a `String`.
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  /// Returns the integer payload, if this is an `Integer`.
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Integer(i) => Some(*i),
      _ => None,
    }
  }

  /// Returns the boolean payload, if this is a `Bool`.
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  /// Returns the nested map, if this is a `Map`.
  pub fn as_map(&self) -> Option<&ConfigMap> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  /// Short name of the value kind, used in error messages.
  pub fn kind_name(&self) -> &'static str {
    match self {
      Value::Bool(_) => "boolean",
      Value::Integer(_) => "integer",
      Value::String(_) => "string",
      Value::Map(_) => "map",
    }
  }
}

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

impl From<ConfigMap> for Value {
  fn from(m: ConfigMap) -> Self {
    Value::Map(m)
  }
}

/// Parses a JSON object into a [`ConfigMap`].
///
/// Only the value kinds of [`Value`] are accepted; floats, arrays and `null`
/// are rejected.
pub fn parse_config(json: &str) -> Result<ConfigMap, serde_json::Error> {
  serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_nested_config() {
    let config = parse_config(r#"{"path": "/tmp/trace", "opts": {"depth": 2, "follow": false}}"#)
      .unwrap();
    assert_eq!(config["path"].as_str(), Some("/tmp/trace"));
    let opts = config["opts"].as_map().unwrap();
    assert_eq!(opts["depth"].as_i64(), Some(2));
    assert_eq!(opts["follow"].as_bool(), Some(false));
  }

  #[test]
  fn test_parse_rejects_unsupported_kinds() {
    assert!(parse_config(r#"{"ratio": 0.5}"#).is_err());
    assert!(parse_config(r#"{"list": [1, 2]}"#).is_err());
    assert!(parse_config(r#"{"nothing": null}"#).is_err());
  }

  #[test]
  fn test_accessors_reject_other_kinds() {
    let v = Value::from(7i64);
    assert_eq!(v.as_i64(), Some(7));
    assert_eq!(v.as_str(), None);
    assert_eq!(v.as_bool(), None);
    assert_eq!(v.kind_name(), "integer");
  }

  #[test]
  fn test_serialize_untagged() {
    let mut map = ConfigMap::new();
    map.insert("n".to_string(), Value::from(1i64));
    map.insert("s".to_string(), Value::from("x"));
    let json = serde_json::to_string(&Value::Map(map)).unwrap();
    assert_eq!(json, r#"{"n":1,"s":"x"}"#);
  }
}
