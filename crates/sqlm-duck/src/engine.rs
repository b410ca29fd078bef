//! The data-access engine
//!
//! Every operation compiles and validates its input first, then runs inside
//! its own scope: a connection cloned from the root, one transaction, commit
//! on success and rollback otherwise. Nothing is cached between calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use duckdb::{params_from_iter, Connection};
use serde_json::Value as Json;
use sqlm_filter::{FilterCompiler, QueryDocumentTranslator, QueryError};
use sqlm_ir::{Field, FieldType, Model, Predicate, QueryOptions, Row, Schema, SchemaError, SortKey, Value};
use tracing::{debug, info, warn};

use crate::convert::{decode_row, to_duck};
use crate::error::EngineError;
use crate::records::Records;
use crate::sql::{self, Sql};
use crate::StoreConfig;

pub struct DataAccessEngine {
    root: Mutex<Connection>,
    store_calls: AtomicU64,
}

impl DataAccessEngine {
    /// Open (or create) the database described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, EngineError> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        if let Some(threads) = config.threads {
            conn.execute_batch(&format!("SET threads = {}", threads))?;
        }
        if let Some(memory_limit_mb) = config.memory_limit_mb {
            conn.execute_batch(&format!("PRAGMA memory_limit='{}MB'", memory_limit_mb))?;
        }

        info!(path = ?config.path, threads = ?config.threads, "Opened DuckDB store");
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::open(&StoreConfig::default())
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            root: Mutex::new(conn),
            store_calls: AtomicU64::new(0),
        }
    }

    /// Number of store scopes opened so far
    pub fn store_calls(&self) -> u64 {
        self.store_calls.load(Ordering::Relaxed)
    }

    /// Typed view over one model
    pub fn records<M: Model>(&self) -> Records<'_, M> {
        Records::new(self)
    }

    /// Create the table for `schema` unless it already exists.
    pub fn create_table(&self, schema: &Schema) -> Result<(), EngineError> {
        let ddl = sql::create_table(schema);
        debug!(sql = %ddl, "create_table");

        self.scope(|conn| Ok(conn.execute_batch(&ddl)?))?;
        info!(table = schema.table(), "Table ready");
        Ok(())
    }

    /// Point lookup by primary key. Absence is `None`.
    pub fn exists(&self, schema: &Schema, id: impl Into<Value>) -> Result<Option<Row>, EngineError> {
        let field = schema.single_key()?;
        let key = vec![(field.name.clone(), writable(field, id.into())?)];

        let stmt = sql::select_by_key(schema, &key);
        debug!(table = schema.table(), sql = %stmt.text, "exists");

        let rows = self.scope(|conn| fetch_rows(conn, &stmt, &all_columns(schema)))?;
        Ok(rows.into_iter().next())
    }

    /// Insert one record and return it as stored.
    ///
    /// Null fields are left to the column default. A missing `uuid` primary
    /// key is generated. Every other required field must be present.
    pub fn create(&self, schema: &Schema, row: &Row) -> Result<Row, EngineError> {
        let mut values = Vec::with_capacity(row.len());
        for (name, value) in row.iter() {
            let field = schema.require(name)?;
            if !value.is_null() {
                values.push((name.to_string(), writable(field, value.clone())?));
            }
        }

        for field in schema.primary_key() {
            if field.ty == FieldType::Uuid && !values.iter().any(|(name, _)| *name == field.name) {
                values.push((field.name.clone(), Value::from(uuid::Uuid::new_v4())));
            }
        }

        if let Some(field) = schema
            .fields()
            .iter()
            .find(|f| f.required() && !values.iter().any(|(name, _)| *name == f.name))
        {
            return Err(SchemaError::Missing(field.name.clone()).into());
        }

        let stmt = sql::insert(schema, &values);
        debug!(table = schema.table(), sql = %stmt.text, params = stmt.params.len(), "create");

        let rows = self.scope(|conn| fetch_rows(conn, &stmt, &all_columns(schema)))?;
        rows.into_iter().next().ok_or_else(|| not_found(schema))
    }

    /// Filtered, ordered, paged read over all columns.
    pub fn read(
        &self,
        schema: &Schema,
        filter: impl Into<Predicate>,
        order_by: Option<&SortKey>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Row>, EngineError> {
        let filter = filter.into();
        self.select(schema, &all_columns(schema), &filter, order_by, limit, offset)
    }

    /// Read with flat query-string parameters (`age[gt]=18&order_by=-name`).
    pub fn query<I, K, V>(&self, schema: &Schema, params: I) -> Result<Vec<Row>, EngineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let compiled = FilterCompiler::new(schema).compile(params)?;
        self.read(
            schema,
            compiled.predicate(),
            compiled.order_by.as_ref(),
            compiled.limit,
            compiled.offset.unwrap_or(0),
        )
    }

    /// Read with a nested query document. A non-empty projection limits
    /// each returned row to the named fields.
    pub fn fetch<S: AsRef<str>>(
        &self,
        schema: &Schema,
        filter: Option<&Json>,
        projection: &[S],
        options: &QueryOptions,
    ) -> Result<Vec<Row>, EngineError> {
        let predicate = QueryDocumentTranslator::new(schema).translate(filter)?;

        let columns = if projection.is_empty() {
            all_columns(schema)
        } else {
            projection
                .iter()
                .map(|name| schema.require(name.as_ref()).map(|f| f.name.as_str()))
                .collect::<Result<Vec<_>, _>>()?
        };

        let sort = options.sort_key();
        self.select(
            schema,
            &columns,
            &predicate,
            sort.as_ref(),
            Some(options.limit()),
            options.skip(),
        )
    }

    /// Apply a partial patch. Primary key fields in the patch are ignored.
    pub fn update(&self, schema: &Schema, existing: &Row, patch: &Row) -> Result<Row, EngineError> {
        let key = identity(schema, existing)?;

        let mut set = Vec::with_capacity(patch.len());
        for (name, value) in patch.iter() {
            if schema.is_primary_key(name) {
                continue;
            }
            set.push((name.to_string(), writable(schema.require(name)?, value.clone())?));
        }

        self.write_by_key(schema, &key, &set)
    }

    /// Overwrite every non-key field of `existing` with `instance`. The
    /// identity always comes from `existing`.
    pub fn replace(&self, schema: &Schema, existing: &Row, instance: &Row) -> Result<Row, EngineError> {
        let key = identity(schema, existing)?;
        for name in instance.fields() {
            schema.require(name)?;
        }

        let set = schema
            .fields()
            .iter()
            .filter(|f| !f.primary_key)
            .map(|f| {
                let value = instance.get(&f.name).cloned().unwrap_or(Value::Null);
                Ok::<_, SchemaError>((f.name.clone(), writable(f, value)?))
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        self.write_by_key(schema, &key, &set)
    }

    /// Remove a record by identity. Deleting a record that is already gone
    /// is not an error.
    pub fn delete(&self, schema: &Schema, existing: &Row) -> Result<(), EngineError> {
        let key = identity(schema, existing)?;
        let stmt = sql::delete(schema, &key);
        debug!(table = schema.table(), sql = %stmt.text, "delete");

        let removed = self.scope(|conn| {
            Ok(conn.execute(&stmt.text, params_from_iter(stmt.params.iter().map(to_duck)))?)
        })?;
        debug!(table = schema.table(), removed, "deleted");
        Ok(())
    }

    fn select<S: AsRef<str>>(
        &self,
        schema: &Schema,
        columns: &[S],
        filter: &Predicate,
        order_by: Option<&SortKey>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Row>, EngineError> {
        filter.validate(schema)?;
        if let Some(key) = order_by {
            schema.require(&key.field)?;
        }
        if let Some(limit) = limit {
            check_count("limit", limit)?;
        }
        check_count("offset", offset)?;

        let stmt = sql::select(schema, columns, filter, order_by, limit, offset);
        debug!(
            table = schema.table(),
            filter = %filter,
            sql = %stmt.text,
            params = stmt.params.len(),
            "select"
        );

        let rows = self.scope(|conn| fetch_rows(conn, &stmt, columns))?;
        debug!(table = schema.table(), rows = rows.len(), "selected");
        Ok(rows)
    }

    fn write_by_key(
        &self,
        schema: &Schema,
        key: &[(String, Value)],
        set: &[(String, Value)],
    ) -> Result<Row, EngineError> {
        // Nothing to write: hand back the stored record
        let stmt = if set.is_empty() {
            sql::select_by_key(schema, key)
        } else {
            sql::update(schema, set, key)
        };
        debug!(table = schema.table(), sql = %stmt.text, params = stmt.params.len(), "write");

        let rows = self.scope(|conn| fetch_rows(conn, &stmt, &all_columns(schema)))?;
        rows.into_iter().next().ok_or_else(|| not_found(schema))
    }

    /// Run `work` in a fresh connection and transaction.
    fn scope<T>(&self, work: impl FnOnce(&Connection) -> Result<T, EngineError>) -> Result<T, EngineError> {
        let mut conn = self
            .root
            .lock()
            .map_err(|_| EngineError::Poisoned)?
            .try_clone()?;
        self.store_calls.fetch_add(1, Ordering::Relaxed);

        let tx = conn.transaction()?;
        match work(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "Rolling back");
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn fetch_rows<S: AsRef<str>>(conn: &Connection, stmt: &Sql, columns: &[S]) -> Result<Vec<Row>, EngineError> {
    let mut prepared = conn.prepare(&stmt.text)?;
    let mut rows = prepared.query(params_from_iter(stmt.params.iter().map(to_duck)))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(decode_row(row, columns)?);
    }
    Ok(out)
}

fn all_columns(schema: &Schema) -> Vec<&str> {
    schema.fields().iter().map(|f| f.name.as_str()).collect()
}

/// DuckDB takes LIMIT and OFFSET as BIGINT.
fn check_count(name: &str, count: u64) -> Result<(), QueryError> {
    if count > i64::MAX as u64 {
        return Err(QueryError::InvalidOption {
            name: name.to_string(),
            value: count.to_string(),
        });
    }
    Ok(())
}

/// Type-check a value about to be stored in `field`.
fn writable(field: &Field, value: Value) -> Result<Value, SchemaError> {
    if value.is_null() && field.required() {
        return Err(SchemaError::Missing(field.name.clone()));
    }
    if let Value::List(_) = value {
        return Err(SchemaError::InvalidValue {
            field: field.name.clone(),
            expected: field.ty.to_string(),
            value: value.to_string(),
        });
    }
    field.check(value)
}

/// Normalized primary key of a stored record
fn identity(schema: &Schema, row: &Row) -> Result<Vec<(String, Value)>, SchemaError> {
    row.key(schema)?
        .into_iter()
        .map(|(name, value)| {
            let value = writable(schema.require(&name)?, value)?;
            Ok::<_, SchemaError>((name, value))
        })
        .collect()
}

fn not_found(schema: &Schema) -> EngineError {
    EngineError::NotFound {
        table: schema.table().to_string(),
    }
}
