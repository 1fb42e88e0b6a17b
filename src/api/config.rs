//! Engine configuration
//!
//! Per-connection settings: foreign-key enforcement and the size limits the
//! engine checks before doing any work. Settings can be given up front with
//! the builder methods or changed later through [`EngineConfig::set`], which
//! validates the value the way `sqlite3_limit` does.

use crate::error::{Error, Result};
use crate::schema::catalog::DEFAULT_MAX_COLUMNS;

/// Default statement length limit (SQLITE_MAX_SQL_LENGTH)
pub const DEFAULT_MAX_SQL_LENGTH: usize = 1_000_000_000;

/// Hard upper bound for the column limit (SQLITE_MAX_COLUMN ceiling)
pub const MAX_COLUMNS_CEILING: usize = 32767;

// ============================================================================
// Engine Configuration
// ============================================================================

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Enforce FOREIGN KEY constraints on insert (off by default)
    pub foreign_keys: bool,
    /// Most columns a table may declare
    pub max_columns: usize,
    /// Longest statement text accepted, in bytes
    pub max_sql_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            foreign_keys: false,
            max_columns: DEFAULT_MAX_COLUMNS,
            max_sql_length: DEFAULT_MAX_SQL_LENGTH,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn max_columns(mut self, max: usize) -> Self {
        self.max_columns = max;
        self
    }

    pub fn max_sql_length(mut self, max: usize) -> Self {
        self.max_sql_length = max;
        self
    }

    /// Change one setting at runtime
    pub fn set(&mut self, option: ConfigOption, value: i64) -> Result<()> {
        match option {
            ConfigOption::ForeignKeys => self.foreign_keys = value != 0,
            ConfigOption::MaxColumns => {
                self.max_columns = positive(value, MAX_COLUMNS_CEILING, "max_columns")?
            }
            ConfigOption::MaxSqlLength => {
                self.max_sql_length = positive(value, DEFAULT_MAX_SQL_LENGTH, "max_sql_length")?
            }
        }
        Ok(())
    }

    /// Current value of one setting
    pub fn get(&self, option: ConfigOption) -> i64 {
        match option {
            ConfigOption::ForeignKeys => i64::from(self.foreign_keys),
            ConfigOption::MaxColumns => self.max_columns as i64,
            ConfigOption::MaxSqlLength => self.max_sql_length as i64,
        }
    }

    /// Reject statement text over the length limit
    pub fn check_sql_length(&self, sql: &str) -> Result<()> {
        if sql.len() > self.max_sql_length {
            return Err(Error::TooBig);
        }
        Ok(())
    }
}

fn positive(value: i64, ceiling: usize, name: &str) -> Result<usize> {
    match usize::try_from(value) {
        Ok(v) if v > 0 && v <= ceiling => Ok(v),
        _ => Err(Error::Misuse(format!(
            "{} must be between 1 and {}",
            name, ceiling
        ))),
    }
}

// ============================================================================
// Configuration Options
// ============================================================================

/// Runtime-settable options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOption {
    /// PRAGMA foreign_keys
    ForeignKeys,
    /// SQLITE_LIMIT_COLUMN
    MaxColumns,
    /// SQLITE_LIMIT_SQL_LENGTH
    MaxSqlLength,
}

// ============================================================================
// Version Information
// ============================================================================

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn libversion() -> &'static str {
    VERSION
}

// ============================================================================
// Tests
// ============================================================================
