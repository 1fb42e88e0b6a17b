//! Core value type and aliases
//!
//! `Value` is the dynamically typed cell stored in every row. Its coercion
//! and ordering rules follow SQLite: NULL sorts first, then numbers (integers
//! and reals compare by magnitude), then text, then blobs.

use std::cmp::Ordering;
use std::fmt;

/// Row ID type (i64 in SQLite)
pub type RowId = i64;

/// Storage classes (SQLITE_INTEGER, SQLITE_FLOAT, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ColumnType {
    /// SQLITE_INTEGER = 1
    Integer = 1,
    /// SQLITE_FLOAT = 2
    Float = 2,
    /// SQLITE_TEXT = 3
    Text = 3,
    /// SQLITE_BLOB = 4
    Blob = 4,
    /// SQLITE_NULL = 5
    Null = 5,
}

// ============================================================================
// Value
// ============================================================================

/// Dynamic cell value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Integer value (64-bit signed)
    Integer(i64),
    /// Real/float value (64-bit IEEE 754)
    Real(f64),
    /// Text value (UTF-8 string)
    Text(String),
    /// Binary large object
    Blob(Vec<u8>),
}

impl Value {
    /// Storage class of this value
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Null => ColumnType::Null,
            Value::Integer(_) => ColumnType::Integer,
            Value::Real(_) => ColumnType::Float,
            Value::Text(_) => ColumnType::Text,
            Value::Blob(_) => ColumnType::Blob,
        }
    }

    /// Name reported by typeof()
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Convert to i64 with SQLite coercion rules
    ///
    /// - NULL -> 0
    /// - Real -> truncated to integer
    /// - Text -> leading numeric prefix, or 0
    /// - Blob -> 0
    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Integer(i) => *i,
            Value::Real(f) => *f as i64,
            Value::Text(s) => {
                let s = s.trim();
                s.parse()
                    .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                    .unwrap_or(0)
            }
            Value::Blob(_) => 0,
        }
    }

    /// Convert to f64 with SQLite coercion rules
    pub fn to_f64(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Integer(i) => *i as f64,
            Value::Real(f) => *f,
            Value::Text(s) => s.trim().parse().unwrap_or(0.0),
            Value::Blob(_) => 0.0,
        }
    }

    /// Convert to string with SQLite coercion rules
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => format_real(*f),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Check if value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for integer and real values
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    /// Truth value in a boolean context; NULL is unknown
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(*i != 0),
            Value::Real(f) => Some(*f != 0.0),
            Value::Text(_) | Value::Blob(_) => Some(self.to_f64() != 0.0),
        }
    }

    /// Render as a SQL literal (used for schema text and shell output)
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => format_real(*f),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(b) => format!("X'{}'", hex::encode_upper(b)),
        }
    }

    /// Total order over values (NULL < numeric < text < blob)
    pub fn compare(&self, other: &Value) -> Ordering {
        fn class(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) | Value::Real(_) => 1,
                Value::Text(_) => 2,
                Value::Blob(_) => 3,
            }
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => self
                .to_f64()
                .partial_cmp(&other.to_f64())
                .unwrap_or(Ordering::Equal),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => class(self).cmp(&class(other)),
        }
    }
}

/// Reals always carry a decimal point so they read back as reals
fn format_real(f: f64) -> String {
    let s = f.to_string();
    if !s.contains('.') && !s.contains('e') && !s.contains('E') && f.is_finite() {
        format!("{}.0", s)
    } else {
        s
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => self.compare(other) == Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Blob(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
