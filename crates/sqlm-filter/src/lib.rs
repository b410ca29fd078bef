//! SQLM filters - the two query surfaces
//!
//! Both compile to the `sqlm_ir::Predicate` tree:
//! - [`FilterCompiler`]: flat `field[op]=value` query parameters
//! - [`QueryDocumentTranslator`]: nested `$`-operator query documents
//!
//! Compilation is pure and validates every field against the schema, so a
//! bad query never reaches storage.

mod document;
mod error;
mod flat;

pub use document::{QueryDocumentTranslator, MAX_DEPTH};
pub use error::QueryError;
pub use flat::{CompiledFilter, FilterCompiler};
