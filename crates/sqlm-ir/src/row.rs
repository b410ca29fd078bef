//! Rows and typed records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{Schema, SchemaError};
use crate::types::Value;

/// A record as seen by the engine: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.to_string(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove a field and convert it to `T`.
    pub fn take<T: FromValue>(&mut self, field: &str) -> Result<T, SchemaError> {
        let value = self.0.remove(field).unwrap_or(Value::Null);
        if value.is_null() && !T::NULLABLE {
            return Err(SchemaError::Missing(field.to_string()));
        }
        let shown = value.to_string();
        T::from_value(value).ok_or_else(|| SchemaError::InvalidValue {
            field: field.to_string(),
            expected: T::EXPECTED.to_string(),
            value: shown,
        })
    }

    /// Values of the schema's primary key fields, in schema order.
    pub fn key(&self, schema: &Schema) -> Result<Vec<(String, Value)>, SchemaError> {
        schema
            .primary_key()
            .map(|field| match self.0.get(&field.name) {
                Some(v) if !v.is_null() => Ok((field.name.clone(), v.clone())),
                _ => Err(SchemaError::Missing(field.name.clone())),
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Build a row from a JSON object. Returns `None` for non-objects or
    /// nested objects.
    pub fn from_json(json: &serde_json::Value) -> Option<Row> {
        json.as_object()?
            .iter()
            .map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Row(iter.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Typed extraction from a `Value`.
pub trait FromValue: Sized {
    const EXPECTED: &'static str;
    const NULLABLE: bool = false;

    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            Value::Int(i) => Some(i as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for uuid::Uuid {
    const EXPECTED: &'static str = "uuid";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => uuid::Uuid::parse_str(&s).ok(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A typed record bound to a schema descriptor.
pub trait Model: Sized {
    fn schema() -> &'static Schema;

    fn to_row(&self) -> Row;

    fn from_row(row: Row) -> Result<Self, SchemaError>;
}
