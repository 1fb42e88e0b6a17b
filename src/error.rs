//! Error types and Result aliases for schemaql
//!
//! Every layer owns a small error enum (`NameError` in the parser,
//! `CatalogError` and the constraint errors in the schema, `StoreError` in
//! the row store). They all fold into the crate-wide [`Error`], which also
//! reports a SQLite-style [`ErrorCode`] so callers can tell operational
//! failures from integrity failures.

use thiserror::Error;

pub use crate::parser::ident::NameError;
pub use crate::schema::catalog::CatalogError;
pub use crate::schema::constraint::{IntegrityError, StructuralConstraintError};
pub use crate::storage::StoreError;

// ============================================================================
// Result Codes
// ============================================================================

/// Primary result codes, numbered like SQLite's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// SQLITE_ERROR - generic operational error
    Error = 1,
    /// SQLITE_TOOBIG - string or statement too large
    TooBig = 18,
    /// SQLITE_CONSTRAINT - a constraint was violated
    Constraint = 19,
    /// SQLITE_MISUSE - API used incorrectly
    Misuse = 21,
    /// SQLITE_RANGE - argument out of range
    Range = 25,
}

impl ErrorCode {
    /// Short description, as returned by sqlite3_errstr()
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Error => "SQL logic error",
            ErrorCode::TooBig => "string or blob too big",
            ErrorCode::Constraint => "constraint failed",
            ErrorCode::Misuse => "bad parameter or other API misuse",
            ErrorCode::Range => "column index out of range",
        }
    }
}

// ============================================================================
// Error
// ============================================================================

/// Crate-wide error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed token stream (unterminated quote, bad blob literal)
    #[error("unrecognized token: \"{text}\" at line {line}, column {column}")]
    Lex { text: String, line: u32, column: u32 },

    /// Grammar violation
    #[error("{message} at line {line}, column {column}")]
    Syntax {
        message: String,
        line: u32,
        column: u32,
    },

    /// Unquoted identifier breaks the naming rules
    #[error(transparent)]
    Name(#[from] NameError),

    /// Name collision or missing schema object
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Inconsistent table definition
    #[error(transparent)]
    Structure(#[from] StructuralConstraintError),

    /// Row rejected by a declared constraint
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Row store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Runtime failure while executing a statement
    #[error("{0}")]
    Execution(String),

    /// Input exceeds a configured limit
    #[error("string or blob too big")]
    TooBig,

    /// API used incorrectly
    #[error("bad parameter or other API misuse: {0}")]
    Misuse(String),
}

impl Error {
    /// Build an execution error from any message
    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    /// Result code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Integrity(_) => ErrorCode::Constraint,
            Error::TooBig => ErrorCode::TooBig,
            Error::Misuse(_) => ErrorCode::Misuse,
            _ => ErrorCode::Error,
        }
    }

    /// True for row-level constraint failures
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }
}

/// Result type alias for schemaql operations
pub type Result<T> = std::result::Result<T, Error>;
