//! SQL generation for DuckDB
//!
//! Renders predicate trees and CRUD statements with `?` placeholders. Values
//! are always bound, never inlined; identifiers come from a validated schema
//! and are double-quoted.

use sqlm_ir::{Condition, FieldType, Op, Predicate, Schema, SortKey, Value};

/// A statement ready to prepare, with its bound values in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Sql {
    pub text: String,
    pub params: Vec<Value>,
}

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Bool => "BOOLEAN",
        FieldType::Int => "BIGINT",
        FieldType::Float => "DOUBLE",
        FieldType::Text | FieldType::Uuid => "VARCHAR",
    }
}

/// Render a predicate tree into `out`, pushing bound values onto `params`.
pub fn render_predicate(predicate: &Predicate, out: &mut String, params: &mut Vec<Value>) {
    match predicate {
        Predicate::Leaf(cond) => render_condition(cond, out, params),
        Predicate::And(nodes) if nodes.is_empty() => out.push_str("TRUE"),
        Predicate::Or(nodes) if nodes.is_empty() => out.push_str("FALSE"),
        Predicate::And(nodes) | Predicate::Or(nodes) => {
            let joiner = if matches!(predicate, Predicate::And(_)) { " AND " } else { " OR " };
            out.push('(');
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    out.push_str(joiner);
                }
                render_predicate(node, out, params);
            }
            out.push(')');
        }
        Predicate::Not(node) => {
            out.push_str("(NOT ");
            render_predicate(node, out, params);
            out.push(')');
        }
    }
}

fn render_condition(cond: &Condition, out: &mut String, params: &mut Vec<Value>) {
    let column = quote(&cond.field);

    match (cond.op, &cond.value) {
        (Op::Eq, Value::Null) => out.push_str(&format!("{} IS NULL", column)),
        (Op::Ne, Value::Null) => out.push_str(&format!("{} IS NOT NULL", column)),
        (Op::In, Value::List(items)) if items.is_empty() => out.push_str("FALSE"),
        (Op::Nin, Value::List(items)) if items.is_empty() => out.push_str("TRUE"),
        (Op::In | Op::Nin, Value::List(items)) => {
            let keyword = if cond.op == Op::In { "IN" } else { "NOT IN" };
            let slots = vec!["?"; items.len()].join(", ");
            out.push_str(&format!("{} {} ({})", column, keyword, slots));
            params.extend(items.iter().cloned());
        }
        (Op::Like, value) => {
            out.push_str(&format!(
                "contains(CAST({} AS VARCHAR), CAST(? AS VARCHAR))",
                column
            ));
            params.push(value.clone());
        }
        (op, value) => {
            let symbol = match op {
                Op::Eq => "=",
                Op::Ne => "<>",
                Op::Lt => "<",
                Op::Lte => "<=",
                Op::Gt => ">",
                Op::Gte => ">=",
                // Membership with a scalar operand degrades to equality
                Op::In => "=",
                Op::Nin => "<>",
                Op::Like => unreachable!("handled above"),
            };
            out.push_str(&format!("{} {} ?", column, symbol));
            params.push(value.clone());
        }
    }
}

fn key_predicate(key: &[(String, Value)]) -> Predicate {
    Predicate::from(
        key.iter()
            .map(|(field, value)| Predicate::eq(field.as_str(), value.clone()))
            .collect::<Vec<_>>(),
    )
}

fn where_clause(predicate: &Predicate, text: &mut String, params: &mut Vec<Value>) {
    if !predicate.is_always() {
        text.push_str(" WHERE ");
        render_predicate(predicate, text, params);
    }
}

/// `SELECT` with optional ordering and paging. Rows are ordered by the
/// primary key after the requested sort key so pages are stable.
pub fn select<S: AsRef<str>>(
    schema: &Schema,
    columns: &[S],
    predicate: &Predicate,
    order_by: Option<&SortKey>,
    limit: Option<u64>,
    offset: u64,
) -> Sql {
    let mut text = format!("SELECT {} FROM {}", column_list(columns), quote(schema.table()));
    let mut params = Vec::new();
    where_clause(predicate, &mut text, &mut params);

    let mut order = Vec::new();
    if let Some(key) = order_by {
        order.push(format!("{} {}", quote(&key.field), if key.desc { "DESC" } else { "ASC" }));
    }
    for field in schema.primary_key() {
        if order_by.map_or(true, |key| key.field != field.name) {
            order.push(format!("{} ASC", quote(&field.name)));
        }
    }
    text.push_str(&format!(" ORDER BY {}", order.join(", ")));

    if let Some(limit) = limit {
        text.push_str(&format!(" LIMIT {}", limit));
    }
    if offset > 0 {
        text.push_str(&format!(" OFFSET {}", offset));
    }

    Sql { text, params }
}

/// `INSERT ... RETURNING` every column
pub fn insert(schema: &Schema, values: &[(String, Value)]) -> Sql {
    let table = quote(schema.table());
    let returning = returning(schema);

    if values.is_empty() {
        return Sql {
            text: format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning),
            params: Vec::new(),
        };
    }

    let names: Vec<&str> = values.iter().map(|(name, _)| name.as_str()).collect();
    let slots = vec!["?"; values.len()].join(", ");
    Sql {
        text: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            column_list(&names),
            slots,
            returning
        ),
        params: values.iter().map(|(_, v)| v.clone()).collect(),
    }
}

/// `UPDATE ... SET ... WHERE <key> RETURNING` every column
pub fn update(schema: &Schema, set: &[(String, Value)], key: &[(String, Value)]) -> Sql {
    let assignments = set
        .iter()
        .map(|(name, _)| format!("{} = ?", quote(name)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut text = format!("UPDATE {} SET {}", quote(schema.table()), assignments);
    let mut params: Vec<Value> = set.iter().map(|(_, v)| v.clone()).collect();

    where_clause(&key_predicate(key), &mut text, &mut params);
    text.push_str(&format!(" RETURNING {}", returning(schema)));

    Sql { text, params }
}

pub fn delete(schema: &Schema, key: &[(String, Value)]) -> Sql {
    let mut text = format!("DELETE FROM {}", quote(schema.table()));
    let mut params = Vec::new();
    where_clause(&key_predicate(key), &mut text, &mut params);
    Sql { text, params }
}

/// Point lookup on the full primary key
pub fn select_by_key(schema: &Schema, key: &[(String, Value)]) -> Sql {
    let columns: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
    select(schema, &columns, &key_predicate(key), None, Some(1), 0)
}

/// `CREATE TABLE IF NOT EXISTS` from the descriptor
pub fn create_table(schema: &Schema) -> String {
    let mut defs: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| {
            let mut def = format!("{} {}", quote(&f.name), column_type(f.ty));
            if !f.nullable || f.primary_key {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    let keys: Vec<&str> = schema.primary_key().map(|f| f.name.as_str()).collect();
    defs.push(format!("PRIMARY KEY ({})", column_list(&keys)));

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(schema.table()),
        defs.join(", ")
    )
}

fn returning(schema: &Schema) -> String {
    let columns: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
    column_list(&columns)
}
