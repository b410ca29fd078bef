//! Flat query-string filters: `field=value` and `field[op]=value`
//!
//! `order_by`, `limit` and `offset` are reserved and become paging metadata;
//! every other parameter becomes one predicate, all of them ANDed.

use serde::Serialize;
use sqlm_ir::{Op, Predicate, Schema, SortKey, Value};

use crate::error::QueryError;

/// Operators accepted inside the brackets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlatOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    Like,
}

impl FlatOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(FlatOp::Gt),
            "gte" => Some(FlatOp::Gte),
            "lt" => Some(FlatOp::Lt),
            "lte" => Some(FlatOp::Lte),
            "eq" => Some(FlatOp::Eq),
            "neq" => Some(FlatOp::Neq),
            "like" => Some(FlatOp::Like),
            _ => None,
        }
    }

    fn to_op(self) -> Op {
        match self {
            FlatOp::Gt => Op::Gt,
            FlatOp::Gte => Op::Gte,
            FlatOp::Lt => Op::Lt,
            FlatOp::Lte => Op::Lte,
            FlatOp::Eq => Op::Eq,
            FlatOp::Neq => Op::Ne,
            FlatOp::Like => Op::Like,
        }
    }
}

/// Output of the flat compiler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledFilter {
    /// Implicitly ANDed, in parameter order
    pub predicates: Vec<Predicate>,
    pub order_by: Option<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl CompiledFilter {
    /// The conjunction of all predicates
    pub fn predicate(&self) -> Predicate {
        Predicate::from(self.predicates.clone())
    }
}

pub struct FilterCompiler<'a> {
    schema: &'a Schema,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Compile ordered query parameters.
    pub fn compile<I, K, V>(&self, params: I) -> Result<CompiledFilter, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut compiled = CompiledFilter::default();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "order_by" => {
                    let sort = SortKey::parse(value);
                    self.schema.require(&sort.field)?;
                    compiled.order_by = Some(sort);
                }
                "limit" => compiled.limit = Some(parse_count(key, value)?),
                "offset" => compiled.offset = Some(parse_count(key, value)?),
                _ => compiled.predicates.push(self.condition(key, value)?),
            }
        }

        Ok(compiled)
    }

    fn condition(&self, param: &str, raw: &str) -> Result<Predicate, QueryError> {
        let (name, token) = split_param(param);
        let field = self.schema.require(name)?;

        let op = FlatOp::parse(token)
            .ok_or_else(|| QueryError::UnknownOperator(token.to_string()))?;

        let value = match op {
            // Containment matches against the text form of the column
            FlatOp::Like => Value::Text(raw.to_string()),
            _ => field.coerce_str(raw)?,
        };

        Ok(Predicate::leaf(name, op.to_op(), value))
    }
}

/// Split `field[op]` into its parts; a bare name defaults to `eq`.
fn split_param(param: &str) -> (&str, &str) {
    if let Some(body) = param.strip_suffix(']') {
        if let Some(open) = body.rfind('[') {
            return (&body[..open], &body[open + 1..]);
        }
    }
    (param, "eq")
}

/// Non-negative and within BIGINT, which is what LIMIT and OFFSET take
fn parse_count(name: &str, raw: &str) -> Result<u64, QueryError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| QueryError::InvalidOption {
            name: name.to_string(),
            value: raw.to_string(),
        })
}
