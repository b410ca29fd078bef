use sqlm_filter::QueryError;
use sqlm_ir::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Database error: {0}")]
    Storage(#[from] duckdb::Error),

    #[error("No {table} record matches the given key")]
    NotFound { table: String },

    #[error("Column '{column}' has a type the engine cannot decode")]
    Decode { column: String },

    #[error("Connection lock poisoned")]
    Poisoned,
}

impl EngineError {
    /// Errors caused by the caller's input rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::Query(_) | EngineError::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        let unknown = EngineError::from(SchemaError::UnknownField {
            table: "users".into(),
            field: "email".into(),
        });
        assert!(unknown.is_client_error());
        assert_eq!(unknown.to_string(), "Field 'email' is not part of the users model");

        let shape = EngineError::from(QueryError::UnknownOperator("$regex".into()));
        assert!(shape.is_client_error());

        assert!(!EngineError::Poisoned.is_client_error());
        assert!(!EngineError::NotFound { table: "users".into() }.is_client_error());
    }
}
