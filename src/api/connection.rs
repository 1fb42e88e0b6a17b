//! Database connection
//!
//! A [`Connection`] owns one catalog, one row store and the settings that
//! govern them. Statements are parsed and dispatched one at a time; schema
//! and row changes take the write lock, queries share the read lock.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::executor::pragma::pragma_writes;
use crate::executor::{
    execute_create_index, execute_create_table, execute_pragma, execute_select, insert_into,
    DefaultEvaluator, Evaluator, InsertContext, InsertOutcome, ResultSet,
};
use crate::parser::ast::Stmt;
use crate::parser::parse_all;
use crate::schema::catalog::{ColumnInfo, SchemaEntry};
use crate::schema::{Catalog, Index, ObjectType, Table};
use crate::storage::{MemoryStore, Row, RowStore};
use crate::types::RowId;

use super::config::{ConfigOption, EngineConfig};

// ============================================================================
// Execution Results
// ============================================================================

/// Outcome of one statement
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    /// Statement ran; `changes` counts rows it stored
    Done { changes: usize },
    /// Statement produced rows
    Rows(ResultSet),
}

impl ExecResult {
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            ExecResult::Rows(rows) => Some(rows),
            ExecResult::Done { .. } => None,
        }
    }

    pub fn changes(&self) -> usize {
        match self {
            ExecResult::Done { changes } => *changes,
            ExecResult::Rows(_) => 0,
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

struct State {
    catalog: Catalog,
    store: Box<dyn RowStore>,
    config: EngineConfig,
    evaluator: Box<dyn Evaluator>,
}

/// An open database
pub struct Connection {
    state: RwLock<State>,
    /// Rows changed by the most recent INSERT
    changes: AtomicI64,
    /// Rows changed since the connection opened
    total_changes: AtomicI64,
    /// Rowid of the most recent successful insert
    last_insert_rowid: AtomicI64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.state.read().config)
            .field("total_changes", &self.total_changes())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open an empty in-memory database with default settings
    pub fn open_in_memory() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::open_with(config, Box::new(MemoryStore::new()), Box::new(DefaultEvaluator))
    }

    /// Open over a caller-supplied row store and expression evaluator
    pub fn open_with(
        config: EngineConfig,
        store: Box<dyn RowStore>,
        evaluator: Box<dyn Evaluator>,
    ) -> Self {
        debug!(?config, "opening connection");
        Connection {
            state: RwLock::new(State {
                catalog: Catalog::with_max_columns(config.max_columns),
                store,
                config,
                evaluator,
            }),
            changes: AtomicI64::new(0),
            total_changes: AtomicI64::new(0),
            last_insert_rowid: AtomicI64::new(0),
        }
    }

    // ------------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------------

    /// Run every statement in `sql`, returning the result of the last one.
    ///
    /// Execution stops at the first failing statement; statements before it
    /// keep their effects.
    pub fn execute(&self, sql: &str) -> Result<ExecResult> {
        Ok(self
            .execute_batch(sql)?
            .pop()
            .unwrap_or(ExecResult::Done { changes: 0 }))
    }

    /// Run every statement in `sql`, returning each result in order
    pub fn execute_batch(&self, sql: &str) -> Result<Vec<ExecResult>> {
        self.state.read().config.check_sql_length(sql)?;
        let stmts = parse_all(sql)?;
        let mut results = Vec::with_capacity(stmts.len());
        for stmt in &stmts {
            results.push(self.execute_stmt(stmt)?);
        }
        Ok(results)
    }

    /// Read a script file and run it
    pub fn execute_file(&self, path: impl AsRef<Path>) -> Result<Vec<ExecResult>> {
        let path = path.as_ref();
        let sql = std::fs::read_to_string(path)
            .map_err(|e| Error::execution(format!("cannot read {}: {}", path.display(), e)))?;
        self.execute_batch(&sql)
    }

    /// Run a single statement that returns rows
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        match self.execute(sql)? {
            ExecResult::Rows(rows) => Ok(rows),
            ExecResult::Done { .. } => Err(Error::Misuse("statement returns no rows".to_string())),
        }
    }

    fn execute_stmt(&self, stmt: &Stmt) -> Result<ExecResult> {
        match stmt {
            Stmt::CreateTable(create) => {
                trace!(table = %create.name.value, "dispatch CREATE TABLE");
                let mut guard = self.state.write();
                let state = &mut *guard;
                execute_create_table(
                    &mut state.catalog,
                    state.store.as_mut(),
                    state.evaluator.as_ref(),
                    create,
                )?;
                Ok(ExecResult::Done { changes: 0 })
            }
            Stmt::CreateIndex(create) => {
                trace!(index = %create.name.value, "dispatch CREATE INDEX");
                let mut guard = self.state.write();
                let state = &mut *guard;
                execute_create_index(
                    &mut state.catalog,
                    state.store.as_ref(),
                    state.evaluator.as_ref(),
                    create,
                )?;
                Ok(ExecResult::Done { changes: 0 })
            }
            Stmt::Insert(insert) => {
                trace!(table = %insert.table, "dispatch INSERT");
                let mut guard = self.state.write();
                let state = &mut *guard;
                let mut cx = InsertContext {
                    catalog: &mut state.catalog,
                    store: state.store.as_mut(),
                    evaluator: state.evaluator.as_ref(),
                    foreign_keys: state.config.foreign_keys,
                };
                let mut outcome = InsertOutcome::default();
                let result = insert_into(&mut cx, insert, &mut outcome);
                // Rows stored before a failing row stay, so they count
                self.record_changes(outcome.inserted, outcome.last_rowid);
                result?;
                Ok(ExecResult::Done {
                    changes: outcome.inserted,
                })
            }
            Stmt::Select(select) => {
                trace!("dispatch SELECT");
                let state = self.state.read();
                let rows = execute_select(
                    &state.catalog,
                    state.store.as_ref(),
                    state.evaluator.as_ref(),
                    select,
                )?;
                Ok(ExecResult::Rows(rows))
            }
            Stmt::Pragma(pragma) => {
                trace!(pragma = %pragma.name, "dispatch PRAGMA");
                let result = if pragma_writes(pragma) {
                    let mut guard = self.state.write();
                    let state = &mut *guard;
                    execute_pragma(&state.catalog, &mut state.config, pragma)?
                } else {
                    let state = self.state.read();
                    let mut config = state.config.clone();
                    execute_pragma(&state.catalog, &mut config, pragma)?
                };
                if result.columns.is_empty() {
                    Ok(ExecResult::Done { changes: 0 })
                } else {
                    Ok(ExecResult::Rows(ResultSet {
                        columns: result.columns,
                        rows: result.rows,
                    }))
                }
            }
        }
    }

    fn record_changes(&self, inserted: usize, last_rowid: Option<RowId>) {
        let inserted = inserted as i64;
        self.changes.store(inserted, Ordering::SeqCst);
        self.total_changes.fetch_add(inserted, Ordering::SeqCst);
        if let Some(rowid) = last_rowid {
            self.last_insert_rowid.store(rowid, Ordering::SeqCst);
        }
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn config(&self) -> EngineConfig {
        self.state.read().config.clone()
    }

    /// Change a setting; the column limit applies to tables created afterwards
    pub fn set_config(&self, option: ConfigOption, value: i64) -> Result<()> {
        let mut state = self.state.write();
        state.config.set(option, value)?;
        if option == ConfigOption::MaxColumns {
            let max = state.config.max_columns;
            state.catalog.set_max_columns(max);
        }
        Ok(())
    }

    pub fn foreign_keys_enabled(&self) -> bool {
        self.state.read().config.foreign_keys
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn lookup_table(&self, name: &str) -> Option<Arc<Table>> {
        self.state.read().catalog.lookup_table(name)
    }

    pub fn lookup_index(&self, name: &str) -> Option<Arc<Index>> {
        self.state.read().catalog.lookup_index(name)
    }

    /// Column listing for a table, as `PRAGMA table_info` reports it
    pub fn table_info(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.state.read().catalog.table_info(table)
    }

    /// Every schema object in creation order
    pub fn schema_entries(&self) -> Vec<SchemaEntry> {
        self.state.read().catalog.schema_entries().to_vec()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.names_of(ObjectType::Table, None)
    }

    /// Index names, optionally only those on one table
    pub fn index_names(&self, table: Option<&str>) -> Vec<String> {
        self.names_of(ObjectType::Index, table)
    }

    fn names_of(&self, kind: ObjectType, table: Option<&str>) -> Vec<String> {
        self.state
            .read()
            .catalog
            .schema_entries()
            .iter()
            .filter(|e| e.kind == kind)
            .filter(|e| table.map_or(true, |t| e.tbl_name.eq_ignore_ascii_case(t)))
            .map(|e| e.name.clone())
            .collect()
    }

    /// All rows of a table in rowid order
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let state = self.state.read();
        let table = state
            .catalog
            .lookup_table(table)
            .ok_or_else(|| crate::schema::catalog::CatalogError::UnknownTable(table.to_string()))?;
        Ok(state
            .store
            .scan(&table.key(), &mut |_| Ok(true))?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    // ------------------------------------------------------------------------
    // Change counters
    // ------------------------------------------------------------------------

    pub fn changes(&self) -> i64 {
        self.changes.load(Ordering::SeqCst)
    }

    pub fn total_changes(&self) -> i64 {
        self.total_changes.load(Ordering::SeqCst)
    }

    pub fn last_insert_rowid(&self) -> RowId {
        self.last_insert_rowid.load(Ordering::SeqCst)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::open_in_memory()
    }
}

// ============================================================================
// Tests
// ============================================================================
