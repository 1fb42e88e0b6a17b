//! Schema objects
//!
//! Tables, columns, keys and indexes as the catalog stores them. Definitions
//! are built from the parsed AST by [`build`], checked by [`constraint`] and
//! registered in the [`catalog::Catalog`].
//!
//! Key and foreign-key column lists hold column *names* as written; they are
//! resolved to positions on use, so a key naming a missing column survives
//! long enough for the structural check to report it.

pub mod build;
pub mod catalog;
pub mod constraint;

use std::fmt;

use bitflags::bitflags;

use crate::parser::ast::{ConflictAction, DefaultValue, Expr, ForeignKeyAction, SortOrder};
use crate::parser::ident::normalize;
use crate::types::Value;

pub use catalog::{Catalog, ColumnInfo, SchemaEntry};

// ============================================================================
// Constants
// ============================================================================

/// Default collation sequence
pub const DEFAULT_COLLATION: &str = "BINARY";

/// Prefix reserved for internal objects
pub const RESERVED_PREFIX: &str = "sqlite_";

// ============================================================================
// Type Affinity
// ============================================================================

/// Column type affinity (Section 3.1 of SQLite docs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// BLOB affinity (no type coercion)
    #[default]
    Blob,
    /// TEXT affinity
    Text,
    /// NUMERIC affinity (prefers integer, then real)
    Numeric,
    /// INTEGER affinity
    Integer,
    /// REAL affinity
    Real,
}

/// Determine column affinity from type name (Section 3.1.1 of SQLite docs)
///
/// The affinity is determined by the declared type using these rules:
/// 1. If type contains "INT" -> INTEGER
/// 2. If type contains "CHAR", "CLOB", or "TEXT" -> TEXT
/// 3. If type contains "BLOB" or is empty -> BLOB
/// 4. If type contains "REAL", "FLOA", or "DOUB" -> REAL
/// 5. Otherwise -> NUMERIC
pub fn type_affinity(type_name: &str) -> Affinity {
    let upper = type_name.to_uppercase();

    // Rule 1: INT -> INTEGER
    if upper.contains("INT") {
        return Affinity::Integer;
    }

    // Rule 2: CHAR, CLOB, TEXT -> TEXT
    if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        return Affinity::Text;
    }

    // Rule 3: BLOB or empty -> BLOB
    if upper.contains("BLOB") || type_name.trim().is_empty() {
        return Affinity::Blob;
    }

    // Rule 4: REAL, FLOA, DOUB -> REAL
    if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        return Affinity::Real;
    }

    // Rule 5: Otherwise -> NUMERIC
    Affinity::Numeric
}

impl Affinity {
    /// Coerce a value toward this affinity.
    ///
    /// Conversions are lossless only: text that does not read as a number
    /// stays text in a numeric column, and blobs are never touched.
    pub fn apply(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (_, Value::Blob(b)) => Value::Blob(b),
            (Affinity::Blob, v) => v,
            (Affinity::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (Affinity::Text, Value::Real(f)) => Value::Text(Value::Real(f).to_text()),
            (Affinity::Text, v) => v,
            (Affinity::Real, Value::Integer(i)) => Value::Real(i as f64),
            (Affinity::Real, Value::Text(s)) => match parse_numeric(&s) {
                Some(n) => Value::Real(n.to_f64()),
                None => Value::Text(s),
            },
            (Affinity::Real, v) => v,
            (Affinity::Integer | Affinity::Numeric, Value::Real(f)) => real_to_integer(f),
            (Affinity::Integer | Affinity::Numeric, Value::Text(s)) => match parse_numeric(&s) {
                Some(Value::Real(f)) => real_to_integer(f),
                Some(n) => n,
                None => Value::Text(s),
            },
            (Affinity::Integer | Affinity::Numeric, v) => v,
        }
    }
}

/// Reals with an exact integer value become integers
fn real_to_integer(f: f64) -> Value {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Value::Integer(f as i64)
    } else {
        Value::Real(f)
    }
}

/// Text that reads as a well-formed number
fn parse_numeric(text: &str) -> Option<Value> {
    let s = text.trim();
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Real)
}

// ============================================================================
// Column Definition
// ============================================================================

bitflags! {
    /// Per-column constraint flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColumnFlags: u8 {
        const PRIMARY_KEY   = 0x01;
        const NOT_NULL      = 0x02;
        const UNIQUE        = 0x04;
        const HAS_DEFAULT   = 0x08;
        const AUTOINCREMENT = 0x10;
    }
}

/// Column in a table
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type, verbatim (empty when omitted)
    pub type_name: String,
    /// Type affinity
    pub affinity: Affinity,
    pub flags: ColumnFlags,
    /// NOT NULL conflict action
    pub not_null_conflict: Option<ConflictAction>,
    /// Default value
    pub default_value: Option<DefaultValue>,
    /// Collation sequence name
    pub collation: String,
    /// 1-based position within the primary key
    pub pk_order: Option<usize>,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            name: String::new(),
            type_name: String::new(),
            affinity: Affinity::Blob,
            flags: ColumnFlags::empty(),
            not_null_conflict: None,
            default_value: None,
            collation: DEFAULT_COLLATION.to_string(),
            pk_order: None,
        }
    }
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Column with a declared type and its derived affinity
    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: name.into(),
            affinity: type_affinity(&type_name),
            type_name,
            ..Default::default()
        }
    }

    pub fn not_null(&self) -> bool {
        self.flags.contains(ColumnFlags::NOT_NULL)
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.contains(ColumnFlags::PRIMARY_KEY)
    }

    pub fn default_text(&self) -> Option<&str> {
        self.default_value.as_ref().map(|d| d.text.as_str())
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Primary key declaration
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    /// Key columns in key order
    pub columns: Vec<String>,
    pub conflict: Option<ConflictAction>,
    pub autoincrement: bool,
    /// Only recorded for a single-column key declared inline
    pub order: Option<SortOrder>,
}

/// UNIQUE declaration (inline or table-level)
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub conflict: Option<ConflictAction>,
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    /// Columns in this table
    pub columns: Vec<String>,
    /// Referenced table name
    pub ref_table: String,
    /// Referenced columns (None = primary key)
    pub ref_columns: Option<Vec<String>>,
    /// ON DELETE action
    pub on_delete: Option<ForeignKeyAction>,
    /// ON UPDATE action
    pub on_update: Option<ForeignKeyAction>,
}

/// CHECK constraint
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConstraint {
    pub name: Option<String>,
    /// Expression text as written
    pub text: String,
    pub expr: Expr,
}

impl CheckConstraint {
    /// Name used in error messages: the constraint name, or its text
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.text)
    }
}

// ============================================================================
// Table
// ============================================================================

/// Database table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub unique_keys: Vec<UniqueKey>,
    /// Foreign key constraints
    pub foreign_keys: Vec<ForeignKey>,
    /// CHECK constraints
    pub checks: Vec<CheckConstraint>,
    /// Declared TEMP
    pub temporary: bool,
    /// CREATE TABLE statement (for schema table)
    pub sql: Option<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Catalog key for this table
    pub fn key(&self) -> String {
        normalize(&self.name)
    }

    /// Find column index by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize(name);
        self.columns
            .iter()
            .position(|c| normalize(&c.name) == wanted)
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    /// Resolve a list of column names; None if any is missing
    pub fn column_indices(&self, names: &[String]) -> Option<Vec<usize>> {
        names.iter().map(|n| self.column_index(n)).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column index of an INTEGER PRIMARY KEY (rowid alias)
    ///
    /// Only a single-column key whose declared type is exactly `INTEGER`
    /// aliases the rowid; `INT PRIMARY KEY` is an ordinary key.
    pub fn rowid_alias(&self) -> Option<usize> {
        let pk = self.primary_key.as_ref()?;
        if pk.columns.len() != 1 || pk.order == Some(SortOrder::Desc) {
            return None;
        }
        let idx = self.column_index(&pk.columns[0])?;
        if self.columns[idx].type_name.eq_ignore_ascii_case("INTEGER") {
            Some(idx)
        } else {
            None
        }
    }

    /// True when the rowid alias was declared AUTOINCREMENT
    pub fn is_autoincrement(&self) -> bool {
        self.rowid_alias().is_some()
            && self.primary_key.as_ref().is_some_and(|pk| pk.autoincrement)
    }

    /// Copy of the column shape only: names and declared types, nothing else
    pub fn shape_copy(&self, name: impl Into<String>) -> Table {
        Table {
            name: name.into(),
            columns: self
                .columns
                .iter()
                .map(|c| Column::typed(c.name.clone(), c.type_name.clone()))
                .collect(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Index
// ============================================================================

/// Index column specification
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    /// Sort order
    pub sort_order: SortOrder,
    /// Collation sequence
    pub collation: String,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_order: SortOrder::Asc,
            collation: DEFAULT_COLLATION.to_string(),
        }
    }
}

/// What created an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexOrigin {
    /// CREATE INDEX
    #[default]
    CreateIndex,
    /// UNIQUE constraint
    Unique,
    /// PRIMARY KEY constraint
    PrimaryKey,
}

impl IndexOrigin {
    /// Code reported by PRAGMA index_list
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexOrigin::CreateIndex => "c",
            IndexOrigin::Unique => "u",
            IndexOrigin::PrimaryKey => "pk",
        }
    }
}

/// Database index
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Index {
    /// Index name
    pub name: String,
    /// Table this indexes
    pub table: String,
    /// Index columns
    pub columns: Vec<IndexColumn>,
    /// Is UNIQUE index
    pub unique: bool,
    pub origin: IndexOrigin,
    /// WHERE clause of a partial index
    pub partial: Option<Expr>,
    /// CREATE INDEX statement (for schema table)
    pub sql: Option<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Kind of a schema object, as listed in sqlite_master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Table,
    Index,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "table",
            ObjectType::Index => "index",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_affinity() {
        assert_eq!(type_affinity("INTEGER"), Affinity::Integer);
        assert_eq!(type_affinity("BIGINT"), Affinity::Integer);
        assert_eq!(type_affinity("VARCHAR(80)"), Affinity::Text);
        assert_eq!(type_affinity("CLOB"), Affinity::Text);
        assert_eq!(type_affinity(""), Affinity::Blob);
        assert_eq!(type_affinity("DOUBLE PRECISION"), Affinity::Real);
        assert_eq!(type_affinity("DECIMAL(10,2)"), Affinity::Numeric);
        assert_eq!(type_affinity("DATE"), Affinity::Numeric);
    }

    #[test]
    fn test_affinity_apply() {
        assert_eq!(Affinity::Integer.apply(Value::Text("42".into())), Value::Integer(42));
        assert!(matches!(
            Affinity::Integer.apply(Value::Text(" 42 ".into())),
            Value::Integer(42)
        ));
        assert!(matches!(
            Affinity::Integer.apply(Value::Real(3.0)),
            Value::Integer(3)
        ));
        assert!(matches!(
            Affinity::Numeric.apply(Value::Text("2.5".into())),
            Value::Real(_)
        ));
        assert!(matches!(
            Affinity::Integer.apply(Value::Text("abc".into())),
            Value::Text(_)
        ));
        assert!(matches!(Affinity::Real.apply(Value::Integer(1)), Value::Real(_)));
        assert!(matches!(
            Affinity::Text.apply(Value::Integer(7)),
            Value::Text(ref s) if s == "7"
        ));
        assert!(matches!(
            Affinity::Blob.apply(Value::Text("1".into())),
            Value::Text(_)
        ));
        assert!(Affinity::Integer.apply(Value::Null).is_null());
    }

    #[test]
    fn test_rowid_alias() {
        let mut table = Table::new("t");
        table.columns.push(Column::typed("id", "INTEGER"));
        table.primary_key = Some(PrimaryKey {
            columns: vec!["id".into()],
            conflict: None,
            autoincrement: false,
            order: None,
        });
        assert_eq!(table.rowid_alias(), Some(0));

        table.columns[0] = Column::typed("id", "INT");
        assert_eq!(table.rowid_alias(), None);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let mut table = Table::new("Users");
        table.columns.push(Column::typed("Name", "TEXT"));
        assert_eq!(table.column_index("NAME"), Some(0));
        assert_eq!(table.key(), "users");
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_shape_copy_drops_constraints() {
        let mut table = Table::new("src");
        let mut col = Column::typed("id", "INTEGER");
        col.flags = ColumnFlags::PRIMARY_KEY | ColumnFlags::NOT_NULL;
        col.pk_order = Some(1);
        table.columns.push(col);
        table.primary_key = Some(PrimaryKey {
            columns: vec!["id".into()],
            conflict: None,
            autoincrement: false,
            order: None,
        });

        let copy = table.shape_copy("dst");
        assert_eq!(copy.name, "dst");
        assert_eq!(copy.columns[0].type_name, "INTEGER");
        assert!(copy.columns[0].flags.is_empty());
        assert!(copy.primary_key.is_none());
    }
}
