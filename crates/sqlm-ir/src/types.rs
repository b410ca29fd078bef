//! Value model and field types for SQLM IR

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar (or list of scalars) flowing through predicates and rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Operand of `in` / `nin`
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON value. Objects (at any depth) have no representation
    /// and yield `None`.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            // NaN and infinities have no JSON form
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
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
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<uuid::Uuid> for Value {
    fn from(id: uuid::Uuid) -> Self {
        Value::Text(id.hyphenated().to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Storage type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    /// Stored as canonical lowercase hyphenated text
    Uuid,
}

impl FieldType {
    /// Parse a raw query-string value into this type.
    pub fn coerce_str(self, raw: &str) -> Option<Value> {
        match self {
            FieldType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldType::Int => raw.trim().parse().ok().map(Value::Int),
            FieldType::Float => raw.trim().parse().ok().map(Value::Float),
            FieldType::Text => Some(Value::Text(raw.to_string())),
            FieldType::Uuid => uuid::Uuid::parse_str(raw.trim()).ok().map(Value::from),
        }
    }

    /// Check a typed value against this field type, normalizing where the
    /// stored form differs. Null is accepted for every type.
    pub fn accept(self, value: Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (_, Value::List(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::List(_) => None,
                    other => self.accept(other),
                })
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            (FieldType::Bool, v @ Value::Bool(_)) => Some(v),
            (FieldType::Int, v @ Value::Int(_)) => Some(v),
            (FieldType::Float, v @ Value::Float(_)) => Some(v),
            (FieldType::Float, Value::Int(i)) => Some(Value::Float(i as f64)),
            (FieldType::Text, v @ Value::Text(_)) => Some(v),
            (FieldType::Uuid, Value::Text(s)) => self.coerce_str(&s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(Value::from_json(&json!(5)), Some(Value::Int(5)));
        assert_eq!(Value::from_json(&json!(2.5)), Some(Value::Float(2.5)));
        assert_eq!(
            Value::from_json(&json!([1, "a"])),
            Some(Value::List(vec![Value::Int(1), Value::Text("a".into())]))
        );
        assert_eq!(Value::from_json(&json!({"a": 1})), None);
        assert_eq!(Value::from_json(&json!([{"a": 1}])), None);
    }

    #[test]
    fn test_coerce_str() {
        assert_eq!(FieldType::Int.coerce_str("18"), Some(Value::Int(18)));
        assert_eq!(FieldType::Int.coerce_str("eighteen"), None);
        assert_eq!(FieldType::Bool.coerce_str("TRUE"), Some(Value::Bool(true)));
        assert_eq!(FieldType::Float.coerce_str("1.5"), Some(Value::Float(1.5)));

        let upper = "67E55044-10B1-426F-9247-BB680E5FE0C8";
        assert_eq!(
            FieldType::Uuid.coerce_str(upper),
            Some(Value::Text("67e55044-10b1-426f-9247-bb680e5fe0c8".into()))
        );
    }

    #[test]
    fn test_accept_widens_int_to_float() {
        assert_eq!(FieldType::Float.accept(Value::Int(3)), Some(Value::Float(3.0)));
        assert_eq!(FieldType::Int.accept(Value::Float(3.0)), None);
        assert_eq!(FieldType::Text.accept(Value::Null), Some(Value::Null));
        assert_eq!(
            FieldType::Int.accept(Value::List(vec![Value::Int(1), Value::Text("x".into())])),
            None
        );
    }
}
