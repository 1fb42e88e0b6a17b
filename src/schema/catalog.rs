//! Catalog
//!
//! Registry of every table and index, keyed by normalized name in a single
//! namespace: a table and an index can never share a name. Registration
//! never overwrites. A creation-ordered list of [`SchemaEntry`] values backs
//! the read-only `sqlite_master` table.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::error::Result;
use crate::parser::ident::normalize;
use crate::schema::constraint::check_structure;
use crate::schema::{
    Column, Index, IndexColumn, IndexOrigin, ObjectType, Table, RESERVED_PREFIX,
};
use crate::storage::{Row, RowStore};
use crate::types::{RowId, Value};

/// Default column limit (SQLITE_MAX_COLUMN)
pub const DEFAULT_MAX_COLUMNS: usize = 2000;

/// Name of the schema listing table
pub const MASTER_TABLE: &str = "sqlite_master";

/// Alternate name of the schema listing table
pub const SCHEMA_TABLE: &str = "sqlite_schema";

// ============================================================================
// Errors
// ============================================================================

/// Catalog lookup and registration failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The name is held by an existing table or index
    #[error("{kind} {name} already exists")]
    DuplicateName { kind: ObjectType, name: String },

    #[error("no such table: {0}")]
    UnknownTable(String),

    #[error("no such index: {0}")]
    UnknownIndex(String),

    #[error("table {table} has no column named {column}")]
    UnknownColumn { table: String, column: String },

    #[error("object name reserved for internal use: {0}")]
    ReservedName(String),
}

// ============================================================================
// Introspection Types
// ============================================================================

/// One row of the schema listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub kind: ObjectType,
    pub name: String,
    pub tbl_name: String,
    /// Creating statement; None for automatic indexes
    pub sql: Option<String>,
}

/// One row of `table_info`: (cid, name, type, notnull, dflt_value, pk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub cid: usize,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    /// 1-based position in the primary key, 0 when not a key column
    pub pk: usize,
}

// ============================================================================
// Catalog
// ============================================================================

/// In-memory registry of schema objects
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: HashMap<String, Arc<Table>>,
    indexes: HashMap<String, Arc<Index>>,
    entries: Vec<SchemaEntry>,
    /// Largest rowid ever issued per AUTOINCREMENT table
    sequences: HashMap<String, RowId>,
    max_columns: usize,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::with_max_columns(DEFAULT_MAX_COLUMNS)
    }

    pub fn with_max_columns(max_columns: usize) -> Self {
        Catalog {
            tables: HashMap::new(),
            indexes: HashMap::new(),
            entries: Vec::new(),
            sequences: HashMap::new(),
            max_columns,
        }
    }

    pub fn max_columns(&self) -> usize {
        self.max_columns
    }

    pub fn set_max_columns(&mut self, max_columns: usize) {
        self.max_columns = max_columns;
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn lookup_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(&normalize(name)).cloned()
    }

    pub fn lookup_index(&self, name: &str) -> Option<Arc<Index>> {
        self.indexes.get(&normalize(name)).cloned()
    }

    /// True if any table or index holds `name`
    pub fn contains(&self, name: &str) -> bool {
        self.object_type(name).is_some()
    }

    pub fn object_type(&self, name: &str) -> Option<ObjectType> {
        let key = normalize(name);
        if self.tables.contains_key(&key) {
            Some(ObjectType::Table)
        } else if self.indexes.contains_key(&key) {
            Some(ObjectType::Index)
        } else {
            None
        }
    }

    /// Tables in creation order
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.entries
            .iter()
            .filter(|e| e.kind == ObjectType::Table)
            .filter_map(|e| self.tables.get(&normalize(&e.name)).cloned())
            .collect()
    }

    /// Indexes on `table` in creation order, automatic indexes first
    pub fn indexes_on(&self, table: &str) -> Vec<&Index> {
        let key = normalize(table);
        self.entries
            .iter()
            .filter(|e| e.kind == ObjectType::Index && normalize(&e.tbl_name) == key)
            .filter_map(|e| self.indexes.get(&normalize(&e.name)).map(|i| i.as_ref()))
            .collect()
    }

    /// Schema listing in creation order
    pub fn schema_entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Column introspection in declared order
    pub fn table_info(&self, name: &str) -> Result<Vec<ColumnInfo>> {
        let table = self
            .lookup_table(name)
            .ok_or_else(|| CatalogError::UnknownTable(name.to_string()))?;
        Ok(table
            .columns
            .iter()
            .enumerate()
            .map(|(cid, col)| ColumnInfo {
                cid,
                name: col.name.clone(),
                type_name: col.type_name.clone(),
                not_null: col.not_null(),
                default_value: col.default_text().map(str::to_string),
                pk: col.pk_order.unwrap_or(0),
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a table along with the automatic indexes of its keys.
    pub fn register_table(&mut self, table: Table) -> Result<Arc<Table>> {
        let key = table.key();
        if key.starts_with(RESERVED_PREFIX) {
            return Err(CatalogError::ReservedName(table.name.clone()).into());
        }
        if let Some(kind) = self.object_type(&key) {
            return Err(CatalogError::DuplicateName {
                kind,
                name: table.name.clone(),
            }
            .into());
        }
        check_structure(&table, self.max_columns)?;

        let auto_indexes = automatic_indexes(&table);
        let table = Arc::new(table);
        self.tables.insert(key, Arc::clone(&table));
        self.entries.push(SchemaEntry {
            kind: ObjectType::Table,
            name: table.name.clone(),
            tbl_name: table.name.clone(),
            sql: table.sql.clone(),
        });
        for index in auto_indexes {
            self.insert_index(index);
        }

        debug!(
            table = %table.name,
            columns = table.columns.len(),
            "registered table"
        );
        Ok(table)
    }

    /// Register an index on an existing table.
    pub fn register_index(&mut self, mut index: Index) -> Result<Arc<Index>> {
        let table = self
            .lookup_table(&index.table)
            .ok_or_else(|| CatalogError::UnknownTable(index.table.clone()))?;
        if let Some(kind) = self.object_type(&index.name) {
            return Err(CatalogError::DuplicateName {
                kind,
                name: index.name.clone(),
            }
            .into());
        }
        if normalize(&index.name).starts_with(RESERVED_PREFIX) {
            return Err(CatalogError::ReservedName(index.name.clone()).into());
        }
        for col in &index.columns {
            if table.column_index(&col.name).is_none() {
                return Err(CatalogError::UnknownColumn {
                    table: table.name.clone(),
                    column: col.name.clone(),
                }
                .into());
            }
        }

        index.table = table.name.clone();
        let index = self.insert_index(index);
        debug!(index = %index.name, table = %index.table, unique = index.unique, "registered index");
        Ok(index)
    }

    fn insert_index(&mut self, index: Index) -> Arc<Index> {
        let index = Arc::new(index);
        self.indexes
            .insert(normalize(&index.name), Arc::clone(&index));
        self.entries.push(SchemaEntry {
            kind: ObjectType::Index,
            name: index.name.clone(),
            tbl_name: index.table.clone(),
            sql: index.sql.clone(),
        });
        index
    }

    /// Undo a table registration, dropping its indexes too.
    pub(crate) fn remove_table(&mut self, name: &str) {
        let key = normalize(name);
        if self.tables.remove(&key).is_none() {
            return;
        }
        self.indexes.retain(|_, index| normalize(&index.table) != key);
        self.entries.retain(|e| normalize(&e.tbl_name) != key);
        self.sequences.remove(&key);
    }

    /// Register a table and allocate its row storage.
    pub fn create_table(&mut self, store: &mut dyn RowStore, table: Table) -> Result<Arc<Table>> {
        let table = self.register_table(table)?;
        if let Err(err) = store.create_table(&table.key()) {
            self.remove_table(&table.name);
            return Err(err.into());
        }
        Ok(table)
    }

    /// `CREATE TABLE name AS SELECT * FROM source WHERE predicate LIMIT limit`
    ///
    /// The new table copies the source's column names and declared types and
    /// nothing else. Rows accepted by `predicate` are copied in rowid order,
    /// at most `limit` of them. Either the table and all its rows appear, or
    /// nothing does. Returns the number of rows copied.
    pub fn create_table_as_select(
        &mut self,
        store: &mut dyn RowStore,
        name: &str,
        source: &str,
        sql: Option<String>,
        predicate: &mut dyn FnMut(&[Value]) -> Result<bool>,
        limit: Option<usize>,
    ) -> Result<usize> {
        let source = self
            .lookup_table(source)
            .ok_or_else(|| CatalogError::UnknownTable(source.to_string()))?;
        if let Some(kind) = self.object_type(name) {
            return Err(CatalogError::DuplicateName {
                kind,
                name: name.to_string(),
            }
            .into());
        }

        let mut rows: Vec<Row> = match limit {
            Some(0) => Vec::new(),
            _ => store
                .scan(&source.key(), predicate)?
                .into_iter()
                .map(|(_, row)| row)
                .collect(),
        };
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        let mut table = source.shape_copy(name);
        table.sql = sql;
        self.populate_table(store, table, rows)
    }

    /// Create a table and fill it; all-or-nothing.
    pub fn populate_table(
        &mut self,
        store: &mut dyn RowStore,
        table: Table,
        rows: Vec<Row>,
    ) -> Result<usize> {
        let table = self.create_table(store, table)?;
        let key = table.key();
        let count = rows.len();
        for row in rows {
            if let Err(err) = store.insert(&key, row) {
                // Rows stored so far go with the table
                let _ = store.drop_table(&key);
                self.remove_table(&table.name);
                return Err(err.into());
            }
        }
        debug!(table = %table.name, rows = count, "populated table");
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // AUTOINCREMENT bookkeeping
    // ------------------------------------------------------------------------

    /// Largest rowid ever issued to an AUTOINCREMENT table
    pub fn sequence(&self, table: &str) -> Option<RowId> {
        self.sequences.get(&normalize(table)).copied()
    }

    pub(crate) fn bump_sequence(&mut self, table: &str, rowid: RowId) {
        let seq = self.sequences.entry(normalize(table)).or_insert(0);
        if rowid > *seq {
            *seq = rowid;
        }
    }

    // ------------------------------------------------------------------------
    // sqlite_master
    // ------------------------------------------------------------------------

    /// True for `sqlite_master` and `sqlite_schema`
    pub fn is_master_name(name: &str) -> bool {
        let key = normalize(name);
        key == MASTER_TABLE || key == SCHEMA_TABLE
    }

    /// Column shape of the schema listing
    pub fn master_table() -> Table {
        let mut table = Table::new(MASTER_TABLE);
        table.columns = vec![
            Column::typed("type", "TEXT"),
            Column::typed("name", "TEXT"),
            Column::typed("tbl_name", "TEXT"),
            Column::typed("rootpage", "INT"),
            Column::typed("sql", "TEXT"),
        ];
        table
    }

    /// Schema listing rows, shaped like [`Catalog::master_table`]
    pub fn master_rows(&self) -> Vec<Row> {
        self.entries
            .iter()
            .map(|e| {
                vec![
                    Value::Text(e.kind.as_str().to_string()),
                    Value::Text(e.name.clone()),
                    Value::Text(e.tbl_name.clone()),
                    Value::Integer(0),
                    e.sql.clone().map(Value::Text).unwrap_or(Value::Null),
                ]
            })
            .collect()
    }
}

/// Indexes backing a table's primary key (unless it aliases the rowid) and
/// each UNIQUE key, named `sqlite_autoindex_<table>_<n>`
fn automatic_indexes(table: &Table) -> Vec<Index> {
    let mut keys: Vec<(IndexOrigin, &Vec<String>)> = Vec::new();
    if let Some(pk) = &table.primary_key {
        if table.rowid_alias().is_none() {
            keys.push((IndexOrigin::PrimaryKey, &pk.columns));
        }
    }
    for unique in &table.unique_keys {
        keys.push((IndexOrigin::Unique, &unique.columns));
    }

    let mut indexes: Vec<Index> = Vec::new();
    for (origin, columns) in keys {
        let normalized: Vec<String> = columns.iter().map(|c| normalize(c)).collect();
        let redundant = indexes.iter().any(|i| {
            i.columns
                .iter()
                .map(|c| normalize(&c.name))
                .eq(normalized.iter().cloned())
        });
        if redundant {
            continue;
        }

        let mut index = Index::new(
            format!("sqlite_autoindex_{}_{}", table.name, indexes.len() + 1),
            table.name.clone(),
        );
        index.columns = columns.iter().map(IndexColumn::new).collect();
        index.unique = true;
        index.origin = origin;
        indexes.push(index);
    }
    indexes
}
