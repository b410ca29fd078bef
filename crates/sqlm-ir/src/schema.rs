//! Schema descriptors: the field table and primary key of a record type

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::types::{FieldType, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Field '{field}' is not part of the {table} model")]
    UnknownField { table: String, field: String },

    #[error("Invalid value for field '{field}': expected {expected}, got {value}")]
    InvalidValue {
        field: String,
        expected: String,
        value: String,
    },

    #[error("Missing value for field '{0}'")]
    Missing(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Duplicate field '{field}' in {table}")]
    DuplicateField { table: String, field: String },

    #[error("Schema {0} has no primary key")]
    NoPrimaryKey(String),

    #[error("Schema {0} has no fields")]
    Empty(String),

    #[error("Key for {table} needs {expected} value(s), got {actual}")]
    KeyArity {
        table: String,
        expected: usize,
        actual: usize,
    },
}

/// One column of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Field {
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
            nullable: true,
        }
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn uuid(name: &str) -> Self {
        Self::new(name, FieldType::Uuid)
    }

    /// Mark as (part of) the primary key. Key fields are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Whether a stored record must carry a non-null value here
    pub fn required(&self) -> bool {
        self.primary_key || !self.nullable
    }

    /// Coerce a raw query-string value to this field's type.
    pub fn coerce_str(&self, raw: &str) -> Result<Value, SchemaError> {
        self.ty.coerce_str(raw).ok_or_else(|| SchemaError::InvalidValue {
            field: self.name.clone(),
            expected: self.ty.to_string(),
            value: format!("{:?}", raw),
        })
    }

    /// Check a typed value (or list of values) against this field's type.
    pub fn check(&self, value: Value) -> Result<Value, SchemaError> {
        let shown = value.to_string();
        self.ty.accept(value).ok_or_else(|| SchemaError::InvalidValue {
            field: self.name.clone(),
            expected: self.ty.to_string(),
            value: shown,
        })
    }
}

/// Immutable field table of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    table: String,
    fields: Vec<Field>,
}

impl Schema {
    /// Build and validate a descriptor.
    pub fn new(table: impl Into<String>, fields: Vec<Field>) -> Result<Self, SchemaError> {
        let table = table.into();
        check_identifier(&table)?;

        if fields.is_empty() {
            return Err(SchemaError::Empty(table));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            check_identifier(&field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    table: table.clone(),
                    field: field.name.clone(),
                });
            }
        }

        if !fields.iter().any(|f| f.primary_key) {
            return Err(SchemaError::NoPrimaryKey(table));
        }

        Ok(Self { table, fields })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field, failing with `UnknownField`.
    pub fn require(&self, name: &str) -> Result<&Field, SchemaError> {
        self.field(name).ok_or_else(|| SchemaError::UnknownField {
            table: self.table.clone(),
            field: name.to_string(),
        })
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.field(name).map_or(false, |f| f.primary_key)
    }

    /// The single key field, for point lookups by one id value.
    pub fn single_key(&self) -> Result<&Field, SchemaError> {
        let mut keys = self.primary_key();
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key),
            _ => Err(SchemaError::KeyArity {
                table: self.table.clone(),
                expected: self.primary_key().count(),
                actual: 1,
            }),
        }
    }
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Schema {
        Schema::new(
            "users",
            vec![
                Field::uuid("id").primary_key(),
                Field::text("name").not_null(),
                Field::int("age"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let schema = users();
        assert_eq!(schema.require("age").unwrap().ty, FieldType::Int);
        assert!(schema.is_primary_key("id"));
        assert!(!schema.is_primary_key("name"));
        assert_eq!(schema.single_key().unwrap().name, "id");

        let err = schema.require("email").unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                table: "users".into(),
                field: "email".into()
            }
        );
    }

    #[test]
    fn test_rejects_invalid_descriptors() {
        assert!(matches!(
            Schema::new("t", vec![Field::int("a")]),
            Err(SchemaError::NoPrimaryKey(_))
        ));
        assert!(matches!(
            Schema::new("t", vec![Field::int("a").primary_key(), Field::text("a")]),
            Err(SchemaError::DuplicateField { .. })
        ));
        assert!(matches!(
            Schema::new("t; drop", vec![Field::int("a").primary_key()]),
            Err(SchemaError::InvalidIdentifier(_))
        ));
        assert!(matches!(Schema::new("t", vec![]), Err(SchemaError::Empty(_))));
    }

    #[test]
    fn test_composite_key_has_no_single_key() {
        let schema = Schema::new(
            "memberships",
            vec![Field::int("user_id").primary_key(), Field::int("group_id").primary_key()],
        )
        .unwrap();

        assert!(matches!(
            schema.single_key(),
            Err(SchemaError::KeyArity { expected: 2, .. })
        ));
    }

    #[test]
    fn test_field_from_yaml_like_json() {
        let field: Field = serde_json::from_str(r#"{"name": "id", "type": "uuid", "primary_key": true}"#).unwrap();
        assert_eq!(field.ty, FieldType::Uuid);
        assert!(field.primary_key);
        assert!(field.nullable);
    }
}
