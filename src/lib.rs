//! schemaql - a relational schema engine speaking SQLite's dialect
//!
//! Parses `CREATE TABLE`, `CREATE INDEX`, `INSERT`, single-table `SELECT` and
//! a handful of `PRAGMA`s, keeps the resulting schema in a [`Catalog`] and
//! enforces declared constraints on every row written to a [`RowStore`].

pub mod error;
pub mod types;
pub mod storage;
pub mod parser;
pub mod executor;
pub mod functions;
pub mod schema;
pub mod api;

// Re-export main public types
pub use error::{Error, ErrorCode, Result};
pub use types::{RowId, Value};

pub use schema::{Catalog, Column, Index, Table};
pub use storage::{MemoryStore, Row, RowStore};

// Re-export API types and functions
pub use api::{libversion, ConfigOption, Connection, EngineConfig, ExecResult, VERSION};
pub use executor::{DefaultEvaluator, Evaluator, ResultSet};
