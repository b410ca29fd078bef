//! Typed access to one model's records

use std::marker::PhantomData;

use serde_json::Value as Json;
use sqlm_ir::{Model, Predicate, QueryOptions, Row, SortKey, Value};

use crate::engine::DataAccessEngine;
use crate::error::EngineError;

/// Engine operations bound to model `M`, converting rows on the way out.
pub struct Records<'e, M> {
    engine: &'e DataAccessEngine,
    _model: PhantomData<fn() -> M>,
}

impl<'e, M: Model> Records<'e, M> {
    pub(crate) fn new(engine: &'e DataAccessEngine) -> Self {
        Self {
            engine,
            _model: PhantomData,
        }
    }

    pub fn create_table(&self) -> Result<(), EngineError> {
        self.engine.create_table(M::schema())
    }

    pub fn exists(&self, id: impl Into<Value>) -> Result<Option<M>, EngineError> {
        match self.engine.exists(M::schema(), id)? {
            Some(row) => Ok(Some(M::from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn create(&self, record: &M) -> Result<M, EngineError> {
        let row = self.engine.create(M::schema(), &record.to_row())?;
        Ok(M::from_row(row)?)
    }

    pub fn read(
        &self,
        filter: impl Into<Predicate>,
        order_by: Option<&SortKey>,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<M>, EngineError> {
        decode(self.engine.read(M::schema(), filter, order_by, limit, offset)?)
    }

    pub fn query<I, K, V>(&self, params: I) -> Result<Vec<M>, EngineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        decode(self.engine.query(M::schema(), params)?)
    }

    /// Projected rows may not carry every field of `M`, so they stay rows.
    pub fn fetch<S: AsRef<str>>(
        &self,
        filter: Option<&Json>,
        projection: &[S],
        options: &QueryOptions,
    ) -> Result<Vec<Row>, EngineError> {
        self.engine.fetch(M::schema(), filter, projection, options)
    }

    pub fn update(&self, existing: &M, patch: &Row) -> Result<M, EngineError> {
        let row = self.engine.update(M::schema(), &existing.to_row(), patch)?;
        Ok(M::from_row(row)?)
    }

    pub fn replace(&self, existing: &M, instance: &M) -> Result<M, EngineError> {
        let row = self
            .engine
            .replace(M::schema(), &existing.to_row(), &instance.to_row())?;
        Ok(M::from_row(row)?)
    }

    pub fn delete(&self, existing: &M) -> Result<(), EngineError> {
        self.engine.delete(M::schema(), &existing.to_row())
    }
}

fn decode<M: Model>(rows: Vec<Row>) -> Result<Vec<M>, EngineError> {
    rows.into_iter()
        .map(|row| M::from_row(row).map_err(EngineError::from))
        .collect()
}
