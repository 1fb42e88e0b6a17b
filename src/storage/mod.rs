//! Row storage
//!
//! The engine talks to row data only through [`RowStore`]. Tables are keyed
//! by their normalized name; rows are positional vectors in the table's
//! column order, each under a unique [`RowId`].

mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

use crate::error::Result;
use crate::types::{RowId, Value};

/// A stored row
pub type Row = Vec<Value>;

/// Row store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("table {0} already exists in row store")]
    TableExists(String),

    #[error("rowid {rowid} already exists in {table}")]
    DuplicateRowId { table: String, rowid: RowId },

    #[error("database or disk is full")]
    RowIdExhausted,
}

/// Persistence layer for row data
pub trait RowStore: Send + Sync {
    /// Allocate storage for a new, empty table.
    fn create_table(&mut self, table: &str) -> std::result::Result<(), StoreError>;

    /// Drop a table and all of its rows.
    fn drop_table(&mut self, table: &str) -> std::result::Result<(), StoreError>;

    /// Append a row under the next free rowid.
    fn insert(&mut self, table: &str, row: Row) -> std::result::Result<RowId, StoreError>;

    /// Store a row under a caller-chosen rowid.
    fn insert_at(
        &mut self,
        table: &str,
        rowid: RowId,
        row: Row,
    ) -> std::result::Result<(), StoreError>;

    /// Rowid the next plain [`insert`](RowStore::insert) would use.
    fn next_rowid(&self, table: &str) -> std::result::Result<RowId, StoreError>;

    /// Rows accepted by `predicate`, in rowid order.
    fn scan(
        &self,
        table: &str,
        predicate: &mut dyn FnMut(&[Value]) -> Result<bool>,
    ) -> Result<Vec<(RowId, Row)>>;

    /// Remove a row; false when no row has that id.
    fn delete(&mut self, table: &str, rowid: RowId) -> std::result::Result<bool, StoreError>;

    /// Number of rows in a table
    fn len(&self, table: &str) -> std::result::Result<usize, StoreError>;

    fn is_empty(&self, table: &str) -> std::result::Result<bool, StoreError> {
        Ok(self.len(table)? == 0)
    }
}
