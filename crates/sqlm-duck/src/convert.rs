//! Conversion between IR values and DuckDB values

use duckdb::types::{Value as DuckValue, ValueRef};
use sqlm_ir::{Row, Value};

use crate::error::EngineError;

/// Bind form of an IR value. Lists never reach a placeholder directly; the
/// renderer expands them into one slot per element.
pub fn to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Int(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::List(items) => DuckValue::List(items.iter().map(to_duck).collect()),
    }
}

/// Decode one cell into an IR value
pub fn from_duck(cell: ValueRef<'_>, column: &str) -> Result<Value, EngineError> {
    let value = match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i.into()),
        ValueRef::SmallInt(i) => Value::Int(i.into()),
        ValueRef::Int(i) => Value::Int(i.into()),
        ValueRef::BigInt(i) => Value::Int(i),
        ValueRef::UTinyInt(i) => Value::Int(i.into()),
        ValueRef::USmallInt(i) => Value::Int(i.into()),
        ValueRef::UInt(i) => Value::Int(i.into()),
        ValueRef::Float(f) => Value::Float(f.into()),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        _ => {
            return Err(EngineError::Decode {
                column: column.to_string(),
            })
        }
    };
    Ok(value)
}

/// Decode a result row whose columns are `columns`, in order.
pub fn decode_row<S: AsRef<str>>(row: &duckdb::Row<'_>, columns: &[S]) -> Result<Row, EngineError> {
    columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let name = column.as_ref();
            let value = from_duck(row.get_ref(i)?, name)?;
            Ok::<_, EngineError>((name.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_values() {
        assert_eq!(to_duck(&Value::Int(7)), DuckValue::BigInt(7));
        assert_eq!(to_duck(&Value::Text("a".into())), DuckValue::Text("a".into()));
        assert_eq!(to_duck(&Value::Null), DuckValue::Null);
    }

    #[test]
    fn test_decode_cells() {
        assert_eq!(from_duck(ValueRef::Boolean(true), "c").unwrap(), Value::Bool(true));
        assert_eq!(from_duck(ValueRef::Int(3), "c").unwrap(), Value::Int(3));
        assert_eq!(from_duck(ValueRef::Double(1.5), "c").unwrap(), Value::Float(1.5));
        assert_eq!(
            from_duck(ValueRef::Text(b"hi"), "c").unwrap(),
            Value::Text("hi".into())
        );
        assert!(matches!(
            from_duck(ValueRef::Blob(b"\x00"), "c"),
            Err(EngineError::Decode { .. })
        ));
    }
}
