//! SQLM Intermediate Representation (IR)
//!
//! The predicate tree both query syntaxes compile to, plus the schema
//! descriptor and row model the data-access engine executes against.
//! All nodes are serializable via serde so compiled filters can be logged.

use serde::{Deserialize, Serialize};
use std::fmt;

mod row;
mod schema;
mod types;

pub use row::{FromValue, Model, Row};
pub use schema::{Field, Schema, SchemaError};
pub use types::{FieldType, Value};

/// Page size used by document-style fetches when no limit is given.
pub const DEFAULT_FETCH_LIMIT: u64 = 25;

/// Comparison operators of a leaf predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    /// Substring containment
    Like,
}

impl Op {
    /// Operators whose operand is a list
    pub fn takes_list(self) -> bool {
        matches!(self, Op::In | Op::Nin)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::In => "in",
            Op::Nin => "not in",
            Op::Like => "contains",
        };
        f.write_str(symbol)
    }
}

/// A boolean condition on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

/// Predicate tree. `And(vec![])` is the always-true predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", content = "args", rename_all = "snake_case")]
pub enum Predicate {
    Leaf(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::And(nodes) if nodes.is_empty())
    }

    pub fn leaf(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Predicate::Leaf(Condition {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Op::Eq, value)
    }

    pub fn not(node: Predicate) -> Self {
        Predicate::Not(Box::new(node))
    }

    /// Visit every leaf condition, depth first.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Predicate::Leaf(cond) => out.push(cond),
            Predicate::And(nodes) | Predicate::Or(nodes) => {
                for node in nodes {
                    node.collect_conditions(out);
                }
            }
            Predicate::Not(node) => node.collect_conditions(out),
        }
    }

    /// Check every leaf against the schema: the field must exist and the
    /// operand must fit its type.
    pub fn validate(&self, schema: &Schema) -> Result<(), SchemaError> {
        for cond in self.conditions() {
            let field = schema.require(&cond.field)?;
            if cond.op.takes_list() != matches!(cond.value, Value::List(_)) {
                return Err(SchemaError::InvalidValue {
                    field: cond.field.clone(),
                    expected: format!("operand for '{}'", cond.op),
                    value: cond.value.to_string(),
                });
            }
            match (cond.op, &cond.value) {
                // Containment compares the text form of any column
                (Op::Like, Value::Text(_)) => {}
                (_, value) => {
                    field.check(value.clone())?;
                }
            }
        }
        Ok(())
    }
}

/// A list of predicates is their conjunction.
impl From<Vec<Predicate>> for Predicate {
    fn from(mut nodes: Vec<Predicate>) -> Self {
        if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            Predicate::And(nodes)
        }
    }
}

impl From<Condition> for Predicate {
    fn from(cond: Condition) -> Self {
        Predicate::Leaf(cond)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Leaf(c) => write!(f, "{} {} {}", c.field, c.op, c.value),
            Predicate::And(nodes) if nodes.is_empty() => write!(f, "TRUE"),
            Predicate::Or(nodes) if nodes.is_empty() => write!(f, "FALSE"),
            Predicate::And(nodes) | Predicate::Or(nodes) => {
                let joiner = if matches!(self, Predicate::And(_)) { " AND " } else { " OR " };
                write!(f, "(")?;
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{}", node)?;
                }
                write!(f, ")")
            }
            Predicate::Not(node) => write!(f, "NOT {}", node),
        }
    }
}

/// Ordering on one field; a leading `-` in the textual form means descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub desc: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), desc: false }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), desc: true }
    }

    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(text),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.desc {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

/// Sorting and paging of a document-style fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
}

impl QueryOptions {
    pub fn sort_key(&self) -> Option<SortKey> {
        self.sort.as_deref().map(SortKey::parse)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_FETCH_LIMIT)
    }

    pub fn skip(&self) -> u64 {
        self.skip.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> Schema {
        Schema::new(
            "users",
            vec![Field::int("id").primary_key(), Field::text("name"), Field::int("age")],
        )
        .unwrap()
    }

    #[test]
    fn test_list_folds_into_and() {
        assert!(Predicate::from(Vec::new()).is_always());

        let single = Predicate::from(vec![Predicate::eq("a", 1i64)]);
        assert_eq!(single, Predicate::eq("a", 1i64));

        let both = Predicate::from(vec![Predicate::eq("a", 1i64), Predicate::eq("b", 2i64)]);
        assert_eq!(
            both,
            Predicate::And(vec![Predicate::eq("a", 1i64), Predicate::eq("b", 2i64)])
        );
    }

    #[test]
    fn test_display() {
        let tree = Predicate::Or(vec![
            Predicate::leaf("age", Op::Gt, 18i64),
            Predicate::not(Predicate::eq("name", "Bob")),
        ]);
        assert_eq!(tree.to_string(), r#"(age > 18 OR NOT name == "Bob")"#);
        assert_eq!(Predicate::always().to_string(), "TRUE");
    }

    #[test]
    fn test_validate_against_schema() {
        let schema = users();

        let ok = Predicate::And(vec![
            Predicate::leaf("age", Op::In, vec![1i64, 2, 3]),
            Predicate::leaf("name", Op::Like, "li"),
            Predicate::leaf("id", Op::Like, "1"),
        ]);
        assert!(ok.validate(&schema).is_ok());

        let unknown = Predicate::not(Predicate::eq("email", "x"));
        assert!(matches!(
            unknown.validate(&schema),
            Err(SchemaError::UnknownField { .. })
        ));

        let mistyped = Predicate::eq("age", "old");
        assert!(matches!(
            mistyped.validate(&schema),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let tree = Predicate::And(vec![
            Predicate::leaf("age", Op::Gte, 21i64),
            Predicate::not(Predicate::Or(vec![Predicate::eq("name", "x")])),
        ]);

        let json = serde_json::to_string(&tree).unwrap();
        let parsed: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, parsed);
    }

    #[test]
    fn test_query_options_defaults() {
        let opts: QueryOptions = serde_json::from_str(r#"{"sort": "-age"}"#).unwrap();
        assert_eq!(opts.limit(), DEFAULT_FETCH_LIMIT);
        assert_eq!(opts.skip(), 0);
        assert_eq!(opts.sort_key(), Some(SortKey::desc("age")));
        assert_eq!(SortKey::parse("name"), SortKey::asc("name"));
    }
}
