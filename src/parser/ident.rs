//! Identifiers and naming rules
//!
//! An [`Identifier`] keeps the unquoted text of a table, column or index name
//! together with the quoting style it was written in. Lookups always go
//! through [`Identifier::normalized`], so `Users`, `"users"` and `[USERS]`
//! name the same object.
//!
//! Quoted names are accepted as written. Bare names go through [`validate`].

use std::fmt;

use thiserror::Error;

/// How a name was written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    #[default]
    Bare,
    /// 'name'
    SingleQuote,
    /// "name"
    DoubleQuote,
    /// `name`
    Backtick,
    /// [name]
    Bracket,
}

/// A schema object name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// Text with quotes removed and escapes resolved
    pub value: String,
    pub quote: QuoteStyle,
}

impl Identifier {
    pub fn bare(value: impl Into<String>) -> Self {
        Identifier {
            value: value.into(),
            quote: QuoteStyle::Bare,
        }
    }

    /// Build an identifier from raw token text, stripping any quotes.
    pub fn from_raw(raw: &str) -> Self {
        let (quote, open, close) = match raw.as_bytes().first() {
            Some(b'\'') => (QuoteStyle::SingleQuote, '\'', '\''),
            Some(b'"') => (QuoteStyle::DoubleQuote, '"', '"'),
            Some(b'`') => (QuoteStyle::Backtick, '`', '`'),
            Some(b'[') => (QuoteStyle::Bracket, '[', ']'),
            _ => return Identifier::bare(raw),
        };

        let inner = raw
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
            .unwrap_or(raw);
        let value = match quote {
            QuoteStyle::Bracket => inner.to_string(),
            _ => {
                let doubled: String = [close, close].iter().collect();
                inner.replace(&doubled, &close.to_string())
            }
        };

        Identifier { value, quote }
    }

    /// Lookup key: Unicode lower-case
    pub fn normalized(&self) -> String {
        normalize(&self.value)
    }

    pub fn is_quoted(&self) -> bool {
        self.quote != QuoteStyle::Bare
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Case-fold a name for catalog lookups
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

// ============================================================================
// Validation
// ============================================================================

/// A bare name that breaks the naming rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("identifier must not be empty")]
    Empty,

    #[error("invalid name \"{0}\": numeric literal must be quoted")]
    NumericLiteral(String),

    #[error("invalid name \"{0}\": date literal must be quoted")]
    DateLiteral(String),

    #[error("invalid name \"{0}\": must not start with a digit")]
    LeadingDigit(String),

    #[error("invalid name \"{0}\": whitespace requires quoting")]
    Whitespace(String),

    #[error("invalid name \"{name}\": illegal character '{ch}'")]
    IllegalCharacter { name: String, ch: char },
}

/// Check a table, column or index name.
///
/// Quoted names are always accepted. A bare name must be non-empty, must not
/// read as a number or a date, must not start with a digit, and may contain
/// only letters (any script), digits, `_` and `$` (not leading).
pub fn validate(name: &str, quoted: bool) -> Result<(), NameError> {
    if quoted {
        return Ok(());
    }

    let first = match name.chars().next() {
        Some(c) => c,
        None => return Err(NameError::Empty),
    };

    if is_date_shaped(name) {
        return Err(NameError::DateLiteral(name.to_string()));
    }

    if is_numeric_literal(name) {
        return Err(NameError::NumericLiteral(name.to_string()));
    }

    if first.is_ascii_digit() {
        return Err(NameError::LeadingDigit(name.to_string()));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(NameError::Whitespace(name.to_string()));
    }

    if first == '$' {
        return Err(NameError::IllegalCharacter {
            name: name.to_string(),
            ch: first,
        });
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
    {
        return Err(NameError::IllegalCharacter {
            name: name.to_string(),
            ch,
        });
    }

    Ok(())
}

/// Integer, hex or decimal literal text
fn is_numeric_literal(text: &str) -> bool {
    let starts_numeric = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.');
    if !starts_numeric {
        return false;
    }

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }

    text.parse::<f64>().is_ok()
}

/// Three digit groups joined by one of `.`, `-` or `/` (2.07.2023, 2023-07-02)
fn is_date_shaped(text: &str) -> bool {
    ['.', '-', '/'].iter().any(|sep| {
        let parts: Vec<&str> = text.split(*sep).collect();
        parts.len() == 3
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    })
}
