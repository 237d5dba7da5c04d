use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field value as delivered by the Source.
///
/// Numbers stay [`serde_json::Number`] so integers are never widened to floats on their way to a
/// `numeric` column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string slice if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(value) => Value::Number(value),
            serde_json::Value::String(value) => Value::String(value),
            serde_json::Value::Array(values) => {
                Value::Array(values.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(value),
            Value::Number(value) => serde_json::Value::Number(value),
            Value::String(value) => serde_json::Value::String(value),
            Value::Array(values) => {
                serde_json::Value::Array(values.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn converts_nested_json() {
        let value = Value::from(json!({"tags": ["a", 1], "meta": {"ok": true}, "none": null}));

        let Value::Object(map) = &value else {
            panic!("expected an object, got {value:?}");
        };
        assert_eq!(
            map["tags"],
            Value::Array(vec![Value::from("a"), Value::from(1)])
        );
        assert!(map["none"].is_null());
        assert_eq!(
            serde_json::Value::from(value),
            json!({"tags": ["a", 1], "meta": {"ok": true}, "none": null})
        );
    }

    #[test]
    fn numbers_round_trip_through_json() {
        let value: Value = serde_json::from_str("12.50").unwrap();

        assert_eq!(serde_json::to_string(&value).unwrap(), "12.5");
        assert!(matches!(value, Value::Number(_)));
    }
}
