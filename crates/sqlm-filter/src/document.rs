//! Nested query documents: `{"age": {"$gt": 18}, "$or": [...]}`
//!
//! Recursive descent over a JSON document. Each `$`-key maps to one rule;
//! any other key names a field and becomes the context for the operators
//! nested below it.

use serde_json::Value as Json;
use sqlm_ir::{Op, Predicate, Schema, Value};

use crate::error::QueryError;

/// Maximum nesting accepted before a document is rejected
pub const MAX_DEPTH: usize = 64;

/// Operator keys of the document grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocOp {
    And,
    Or,
    Nor,
    Not,
    Compare(Op),
}

impl DocOp {
    fn parse(key: &str) -> Option<Self> {
        let op = match key {
            "$and" => DocOp::And,
            "$or" => DocOp::Or,
            "$nor" => DocOp::Nor,
            "$not" => DocOp::Not,
            "$eq" => DocOp::Compare(Op::Eq),
            "$ne" => DocOp::Compare(Op::Ne),
            "$lt" => DocOp::Compare(Op::Lt),
            "$lte" => DocOp::Compare(Op::Lte),
            "$gt" => DocOp::Compare(Op::Gt),
            "$gte" => DocOp::Compare(Op::Gte),
            "$in" => DocOp::Compare(Op::In),
            "$nin" => DocOp::Compare(Op::Nin),
            "$like" => DocOp::Compare(Op::Like),
            _ => return None,
        };
        Some(op)
    }
}

pub struct QueryDocumentTranslator<'a> {
    schema: &'a Schema,
}

impl<'a> QueryDocumentTranslator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Translate a whole query document. Absence, `null`, `{}` and `[]` all
    /// mean "match everything".
    pub fn translate(&self, doc: Option<&Json>) -> Result<Predicate, QueryError> {
        self.translate_in(doc, None)
    }

    /// Translate a document nested under an enclosing field, e.g. the
    /// `{"$gt": 18}` of `{"age": {"$gt": 18}}` with context `age`.
    pub fn translate_in(&self, doc: Option<&Json>, field: Option<&str>) -> Result<Predicate, QueryError> {
        if let Some(name) = field {
            self.schema.require(name)?;
        }

        match doc {
            None | Some(Json::Null) if field.is_none() => Ok(Predicate::always()),
            None => Ok(Predicate::always()),
            Some(Json::Array(items)) if items.is_empty() => Ok(Predicate::always()),
            Some(Json::Array(_)) => Err(QueryError::shape("query", "a mapping")),
            Some(doc) => self.node(doc, field, 0),
        }
    }

    fn node(&self, doc: &Json, field: Option<&str>, depth: usize) -> Result<Predicate, QueryError> {
        if depth > MAX_DEPTH {
            return Err(QueryError::TooDeep(MAX_DEPTH));
        }

        match doc {
            Json::Object(map) => {
                let mut conditions = Vec::with_capacity(map.len());
                for (key, value) in map {
                    conditions.push(self.entry(key, value, field, depth)?);
                }
                // Empty mapping folds to always-true, a single entry stays bare
                Ok(Predicate::from(conditions))
            }
            Json::Array(items) if items.is_empty() => Ok(Predicate::always()),
            Json::Array(_) => Err(QueryError::shape(field.unwrap_or("query"), "a scalar or an operator mapping")),
            scalar => {
                // `{field: value}` is shorthand for `{field: {$eq: value}}`
                let name = field.ok_or_else(|| QueryError::MissingField("$eq".to_string()))?;
                self.compare(Op::Eq, "$eq", scalar, name)
            }
        }
    }

    fn entry(&self, key: &str, value: &Json, field: Option<&str>, depth: usize) -> Result<Predicate, QueryError> {
        match DocOp::parse(key) {
            Some(DocOp::And) => Ok(Predicate::And(self.operands(key, value, field, depth)?)),
            Some(DocOp::Or) => Ok(Predicate::Or(self.operands(key, value, field, depth)?)),
            Some(DocOp::Nor) => Ok(Predicate::not(Predicate::And(
                self.operands(key, value, field, depth)?,
            ))),
            Some(DocOp::Not) => Ok(Predicate::not(self.node(value, field, depth + 1)?)),
            Some(DocOp::Compare(op)) => {
                let name = field.ok_or_else(|| QueryError::MissingField(key.to_string()))?;
                self.compare(op, key, value, name)
            }
            None if key.starts_with('$') => Err(QueryError::UnknownOperator(key.to_string())),
            None => {
                self.schema.require(key)?;
                self.node(value, Some(key), depth + 1)
            }
        }
    }

    /// Operand list of `$and` / `$or` / `$nor`: one sub-node per element.
    fn operands(&self, key: &str, value: &Json, field: Option<&str>, depth: usize) -> Result<Vec<Predicate>, QueryError> {
        let items = value
            .as_array()
            .ok_or_else(|| QueryError::shape(key, "a sequence of sub-documents"))?;

        items
            .iter()
            .map(|item| self.node(item, field, depth + 1))
            .collect()
    }

    fn compare(&self, op: Op, key: &str, value: &Json, name: &str) -> Result<Predicate, QueryError> {
        let field = self.schema.require(name)?;

        let operand = if op.takes_list() {
            let items = value
                .as_array()
                .ok_or_else(|| QueryError::shape(key, "a sequence of values"))?;
            let values = items
                .iter()
                .map(|item| scalar(key, item))
                .collect::<Result<Vec<_>, _>>()?;
            field.check(Value::List(values))?
        } else if op == Op::Like {
            match value {
                Json::String(s) => Value::Text(s.clone()),
                _ => return Err(QueryError::shape(key, "a string")),
            }
        } else {
            field.check(scalar(key, value)?)?
        };

        Ok(Predicate::leaf(name, op, operand))
    }
}

fn scalar(key: &str, value: &Json) -> Result<Value, QueryError> {
    match value {
        Json::Array(_) | Json::Object(_) => Err(QueryError::shape(key, "a scalar value")),
        other => Value::from_json(other).ok_or_else(|| QueryError::shape(key, "a scalar value")),
    }
}
