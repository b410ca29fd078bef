//! Subcommand implementations. Each returns the JSON document to print.

use anyhow::{Context, Result};
use serde_json::Value as Json;
use sqlm_duck::DataAccessEngine;
use sqlm_ir::{QueryOptions, Row, Schema, Value};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown model '{name}' (configured: {known})")]
    UnknownModel { name: String, known: String },

    #[error("{table} '{id}' not found")]
    NotFound { table: String, id: String },

    #[error("Record body must be a JSON object of scalar values")]
    InvalidBody,
}

/// The configured models, addressed by table name
pub struct Catalog {
    schemas: Vec<Schema>,
}

impl Catalog {
    pub fn new(schemas: Vec<Schema>) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Result<&Schema, CommandError> {
        self.schemas
            .iter()
            .find(|s| s.table() == name)
            .ok_or_else(|| CommandError::UnknownModel {
                name: name.to_string(),
                known: self
                    .schemas
                    .iter()
                    .map(|s| s.table())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

pub fn init(engine: &DataAccessEngine, catalog: &Catalog) -> Result<Json> {
    let mut tables = Vec::new();
    for schema in catalog.schemas() {
        engine
            .create_table(schema)
            .with_context(|| format!("Failed to create table {}", schema.table()))?;
        tables.push(Json::from(schema.table()));
    }
    info!(tables = tables.len(), "Initialized store");
    Ok(serde_json::json!({ "tables": tables }))
}

pub fn get(engine: &DataAccessEngine, schema: &Schema, id: &str) -> Result<Json> {
    Ok(load(engine, schema, id)?.to_json())
}

/// Flat `field[op]=value` parameters, in command-line order
pub fn list(engine: &DataAccessEngine, schema: &Schema, params: &[(String, String)]) -> Result<Json> {
    let rows = engine.query(schema, params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    Ok(rows_to_json(&rows))
}

pub fn find(
    engine: &DataAccessEngine,
    schema: &Schema,
    filter: Option<&str>,
    projection: &[String],
    options: &QueryOptions,
) -> Result<Json> {
    let filter = filter
        .map(serde_json::from_str::<Json>)
        .transpose()
        .context("Filter is not valid JSON")?;
    let rows = engine.fetch(schema, filter.as_ref(), projection, options)?;
    Ok(rows_to_json(&rows))
}

pub fn create(engine: &DataAccessEngine, schema: &Schema, body: &str) -> Result<Json> {
    let row = engine.create(schema, &parse_body(body)?)?;
    Ok(row.to_json())
}

/// Update some fields. A patch that leaves the record as stored is not
/// written and reports `{"modified": false}`.
pub fn patch(engine: &DataAccessEngine, schema: &Schema, id: &str, body: &str) -> Result<Json> {
    let patch = parse_body(body)?;
    let existing = load(engine, schema, id)?;

    let mut merged = existing.clone();
    for (name, value) in patch.iter() {
        if !schema.is_primary_key(name) {
            merged.insert(name, schema.require(name)?.check(value.clone())?);
        }
    }
    if merged == existing {
        return Ok(unmodified(&existing));
    }

    Ok(engine.update(schema, &existing, &patch)?.to_json())
}

/// Replace a record, or create it under `id` when there is none.
pub fn put(engine: &DataAccessEngine, schema: &Schema, id: &str, body: &str) -> Result<Json> {
    let mut instance = parse_body(body)?;
    let key = schema.single_key()?;
    let id_value = key.coerce_str(id)?;

    let Some(existing) = engine.exists(schema, id_value.clone())? else {
        instance.insert(&key.name, id_value);
        let created = engine.create(schema, &instance)?;
        info!(table = schema.table(), id = %id, "Created on put");
        return Ok(created.to_json());
    };

    for name in instance.fields() {
        schema.require(name)?;
    }
    let mut merged = existing.clone();
    for field in schema.fields().iter().filter(|f| !f.primary_key) {
        let value = instance.get(&field.name).cloned().unwrap_or(Value::Null);
        merged.insert(&field.name, field.check(value)?);
    }
    if merged == existing {
        return Ok(unmodified(&existing));
    }

    Ok(engine.replace(schema, &existing, &instance)?.to_json())
}

/// Delete by key and print the removed record.
pub fn delete(engine: &DataAccessEngine, schema: &Schema, id: &str) -> Result<Json> {
    let existing = load(engine, schema, id)?;
    engine.delete(schema, &existing)?;
    Ok(existing.to_json())
}

fn load(engine: &DataAccessEngine, schema: &Schema, id: &str) -> Result<Row> {
    let key = schema.single_key()?.coerce_str(id)?;
    engine.exists(schema, key)?.ok_or_else(|| {
        CommandError::NotFound {
            table: schema.table().to_string(),
            id: id.to_string(),
        }
        .into()
    })
}

fn parse_body(body: &str) -> Result<Row> {
    let json: Json = serde_json::from_str(body).context("Record body is not valid JSON")?;
    Ok(Row::from_json(&json).ok_or(CommandError::InvalidBody)?)
}

fn unmodified(existing: &Row) -> Json {
    serde_json::json!({ "modified": false, "record": existing.to_json() })
}

fn rows_to_json(rows: &[Row]) -> Json {
    Json::Array(rows.iter().map(Row::to_json).collect())
}
