//! Query compilation errors

use sqlm_ir::SchemaError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Unknown field or a value that does not fit the field's type
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Operator {operator} expects {expected}")]
    Shape {
        operator: String,
        expected: &'static str,
    },

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Operator {0} must be nested under a field name")]
    MissingField(String),

    #[error("Invalid value for '{name}': {value:?}")]
    InvalidOption { name: String, value: String },

    #[error("Query document nested deeper than {0} levels")]
    TooDeep(usize),
}

impl QueryError {
    pub(crate) fn shape(operator: &str, expected: &'static str) -> Self {
        QueryError::Shape {
            operator: operator.to_string(),
            expected,
        }
    }
}
