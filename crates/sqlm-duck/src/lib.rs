//! DuckDB-backed data-access engine for SQLM
//!
//! Executes predicate trees from `sqlm-filter` against an embedded DuckDB
//! database, one transaction per operation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod convert;
mod engine;
mod error;
mod records;
pub mod sql;

pub use engine::DataAccessEngine;
pub use error::EngineError;
pub use records::Records;

/// Storage parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; `None` keeps the database in memory
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub threads: Option<u32>,

    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}
