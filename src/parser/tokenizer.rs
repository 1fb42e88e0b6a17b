//! SQL tokenization
//!
//! Implements a tokenizer for the DDL/DML subset the engine understands.
//! The rules follow SQLite's tokenizer: keywords are case-insensitive, any
//! byte >= 0x80 is an identifier character (so identifiers may use any
//! script), and characters the grammar has no use for come back as
//! `Illegal` tokens instead of failing the whole statement.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{Error, Result};

// ============================================================================
// Token Types
// ============================================================================

/// Token kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Integer,
    Float,
    String,
    Blob,

    // Identifiers (bare, "double", `backtick` or [bracket] quoted)
    Identifier,

    // Keywords (alphabetical)
    Abort,
    Action,
    And,
    As,
    Asc,
    Autoincrement,
    Between,
    Cascade,
    Case,
    Cast,
    Check,
    Collate,
    Conflict,
    Constraint,
    Create,
    CurrentDate,
    CurrentTime,
    CurrentTimestamp,
    Default,
    Deferrable,
    Deferred,
    Delete,
    Desc,
    Else,
    End,
    Escape,
    Exists,
    Fail,
    Foreign,
    From,
    Glob,
    If,
    Ignore,
    Immediate,
    In,
    Index,
    Initially,
    Insert,
    Into,
    Is,
    Isnull,
    Key,
    Like,
    Limit,
    No,
    Not,
    Notnull,
    Null,
    Offset,
    On,
    Or,
    Pragma,
    Primary,
    References,
    Replace,
    Restrict,
    Rollback,
    Select,
    Set,
    Table,
    Temp,
    Temporary,
    Then,
    Unique,
    Update,
    Values,
    When,
    Where,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Eq,           // =
    EqEq,         // ==
    Ne,           // <>
    BangEq,       // !=
    Lt,           // <
    Le,           // <=
    Gt,           // >
    Ge,           // >=
    Ampersand,    // &
    Pipe,         // |
    DoublePipe,   // ||
    LtLt,         // <<
    GtGt,         // >>
    Tilde,        // ~
    Bang,         // !

    // Punctuation
    LParen,       // (
    RParen,       // )
    Comma,        // ,
    Semicolon,    // ;
    Dot,          // .

    // A character the grammar does not use (#, @, ^, ...)
    Illegal,

    // Special
    Eof,
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        map.insert("ABORT", TokenKind::Abort);
        map.insert("ACTION", TokenKind::Action);
        map.insert("AND", TokenKind::And);
        map.insert("AS", TokenKind::As);
        map.insert("ASC", TokenKind::Asc);
        map.insert("AUTOINCREMENT", TokenKind::Autoincrement);
        map.insert("BETWEEN", TokenKind::Between);
        map.insert("CASCADE", TokenKind::Cascade);
        map.insert("CASE", TokenKind::Case);
        map.insert("CAST", TokenKind::Cast);
        map.insert("CHECK", TokenKind::Check);
        map.insert("COLLATE", TokenKind::Collate);
        map.insert("CONFLICT", TokenKind::Conflict);
        map.insert("CONSTRAINT", TokenKind::Constraint);
        map.insert("CREATE", TokenKind::Create);
        map.insert("CURRENT_DATE", TokenKind::CurrentDate);
        map.insert("CURRENT_TIME", TokenKind::CurrentTime);
        map.insert("CURRENT_TIMESTAMP", TokenKind::CurrentTimestamp);
        map.insert("DEFAULT", TokenKind::Default);
        map.insert("DEFERRABLE", TokenKind::Deferrable);
        map.insert("DEFERRED", TokenKind::Deferred);
        map.insert("DELETE", TokenKind::Delete);
        map.insert("DESC", TokenKind::Desc);
        map.insert("ELSE", TokenKind::Else);
        map.insert("END", TokenKind::End);
        map.insert("ESCAPE", TokenKind::Escape);
        map.insert("EXISTS", TokenKind::Exists);
        map.insert("FAIL", TokenKind::Fail);
        map.insert("FOREIGN", TokenKind::Foreign);
        map.insert("FROM", TokenKind::From);
        map.insert("GLOB", TokenKind::Glob);
        map.insert("IF", TokenKind::If);
        map.insert("IGNORE", TokenKind::Ignore);
        map.insert("IMMEDIATE", TokenKind::Immediate);
        map.insert("IN", TokenKind::In);
        map.insert("INDEX", TokenKind::Index);
        map.insert("INITIALLY", TokenKind::Initially);
        map.insert("INSERT", TokenKind::Insert);
        map.insert("INTO", TokenKind::Into);
        map.insert("IS", TokenKind::Is);
        map.insert("ISNULL", TokenKind::Isnull);
        map.insert("KEY", TokenKind::Key);
        map.insert("LIKE", TokenKind::Like);
        map.insert("LIMIT", TokenKind::Limit);
        map.insert("NO", TokenKind::No);
        map.insert("NOT", TokenKind::Not);
        map.insert("NOTNULL", TokenKind::Notnull);
        map.insert("NULL", TokenKind::Null);
        map.insert("OFFSET", TokenKind::Offset);
        map.insert("ON", TokenKind::On);
        map.insert("OR", TokenKind::Or);
        map.insert("PRAGMA", TokenKind::Pragma);
        map.insert("PRIMARY", TokenKind::Primary);
        map.insert("REFERENCES", TokenKind::References);
        map.insert("REPLACE", TokenKind::Replace);
        map.insert("RESTRICT", TokenKind::Restrict);
        map.insert("ROLLBACK", TokenKind::Rollback);
        map.insert("SELECT", TokenKind::Select);
        map.insert("SET", TokenKind::Set);
        map.insert("TABLE", TokenKind::Table);
        map.insert("TEMP", TokenKind::Temp);
        map.insert("TEMPORARY", TokenKind::Temporary);
        map.insert("THEN", TokenKind::Then);
        map.insert("UNIQUE", TokenKind::Unique);
        map.insert("UPDATE", TokenKind::Update);
        map.insert("VALUES", TokenKind::Values);
        map.insert("WHEN", TokenKind::When);
        map.insert("WHERE", TokenKind::Where);
        map
    };
}

impl TokenKind {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        KEYWORDS.values().any(|kind| kind == self)
    }

    /// Keywords that can never stand in for a name.
    ///
    /// Every other keyword falls back to an identifier in name positions,
    /// so `key`, `action` or `temp` remain usable as column names.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            TokenKind::And
                | TokenKind::As
                | TokenKind::Autoincrement
                | TokenKind::Between
                | TokenKind::Case
                | TokenKind::Cast
                | TokenKind::Check
                | TokenKind::Collate
                | TokenKind::Constraint
                | TokenKind::Create
                | TokenKind::CurrentDate
                | TokenKind::CurrentTime
                | TokenKind::CurrentTimestamp
                | TokenKind::Default
                | TokenKind::Deferrable
                | TokenKind::Delete
                | TokenKind::Else
                | TokenKind::Escape
                | TokenKind::Exists
                | TokenKind::Foreign
                | TokenKind::From
                | TokenKind::In
                | TokenKind::Index
                | TokenKind::Insert
                | TokenKind::Into
                | TokenKind::Is
                | TokenKind::Isnull
                | TokenKind::Limit
                | TokenKind::Not
                | TokenKind::Notnull
                | TokenKind::Null
                | TokenKind::On
                | TokenKind::Or
                | TokenKind::Primary
                | TokenKind::References
                | TokenKind::Select
                | TokenKind::Set
                | TokenKind::Table
                | TokenKind::Then
                | TokenKind::Unique
                | TokenKind::Update
                | TokenKind::Values
                | TokenKind::When
                | TokenKind::Where
        )
    }

    /// Punctuation that always ends a name
    pub fn is_separator(&self) -> bool {
        matches!(
            self,
            TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::Eof
        )
    }
}

// ============================================================================
// Token
// ============================================================================

/// A token from the SQL source
#[derive(Debug, Clone)]
pub struct Token {
    /// Token type
    pub kind: TokenKind,
    /// Start position in source
    pub start: usize,
    /// End position in source (exclusive)
    pub end: usize,
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, start: usize, end: usize, line: u32, column: u32) -> Self {
        Token {
            kind,
            start,
            end,
            line,
            column,
        }
    }

    /// Get the text of this token from the source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Get the length of this token
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the token is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when this token is a quoted identifier ("x", `x` or [x])
    pub fn is_quoted_identifier(&self, source: &str) -> bool {
        self.kind == TokenKind::Identifier
            && matches!(source.as_bytes().get(self.start), Some(b'"' | b'`' | b'['))
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

/// SQL tokenizer
pub struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments()?;

        if self.is_eof() {
            return Ok(Token::new(TokenKind::Eof, self.pos, self.pos, self.line, self.column));
        }

        let start = self.pos;
        let start_line = self.line;
        let start_column = self.column;

        let kind = self.scan_token(start_line, start_column)?;

        Ok(Token::new(kind, start, self.pos, start_line, start_column))
    }

    /// Scan a single token
    fn scan_token(&mut self, line: u32, column: u32) -> Result<TokenKind> {
        let c = self.current();

        // Numbers, including ".5"
        if c.is_ascii_digit() || (c == b'.' && self.peek().is_some_and(|n| n.is_ascii_digit())) {
            return Ok(self.scan_number());
        }

        // Blob literals
        if (c == b'x' || c == b'X') && self.peek() == Some(b'\'') {
            return self.scan_blob(line, column);
        }

        // Identifiers and keywords
        if is_id_start(c) {
            return Ok(self.scan_identifier());
        }

        // Quoted identifiers
        if c == b'"' || c == b'`' || c == b'[' {
            return self.scan_quoted_identifier(line, column);
        }

        // Strings
        if c == b'\'' {
            return self.scan_string(line, column);
        }

        // Operators and punctuation
        Ok(self.scan_operator())
    }

    /// Scan a number (integer or float)
    fn scan_number(&mut self) -> TokenKind {
        // Handle hex numbers
        if self.current() == b'0' && matches!(self.peek(), Some(b'x') | Some(b'X')) {
            self.advance();
            self.advance();
            while !self.is_eof() && self.current().is_ascii_hexdigit() {
                self.advance();
            }
            return TokenKind::Integer;
        }

        let mut kind = TokenKind::Integer;

        // Integer part
        while !self.is_eof() && self.current().is_ascii_digit() {
            self.advance();
        }

        // Fraction
        if !self.is_eof() && self.current() == b'.' && self.peek().is_some_and(|n| n.is_ascii_digit())
        {
            self.advance(); // consume '.'
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
            kind = TokenKind::Float;
        }

        // Exponent
        if !self.is_eof() && matches!(self.current(), b'e' | b'E') {
            let saved_pos = self.pos;
            let saved_column = self.column;
            self.advance();
            if !self.is_eof() && matches!(self.current(), b'+' | b'-') {
                self.advance();
            }
            if !self.is_eof() && self.current().is_ascii_digit() {
                while !self.is_eof() && self.current().is_ascii_digit() {
                    self.advance();
                }
                return TokenKind::Float;
            }
            // Not a valid exponent, restore position
            self.pos = saved_pos;
            self.column = saved_column;
        }

        kind
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while !self.is_eof() && is_id_char(self.current()) {
            self.advance();
        }

        keyword_or_identifier(&self.source[start..self.pos])
    }

    /// Scan a quoted identifier ("foo", `foo`, or [foo])
    fn scan_quoted_identifier(&mut self, line: u32, column: u32) -> Result<TokenKind> {
        let start = self.pos;
        let quote = self.current();
        let close = if quote == b'[' { b']' } else { quote };
        self.advance();

        while !self.is_eof() {
            if self.current() == close {
                // Check for escaped quote (doubled)
                if quote != b'[' && self.peek() == Some(close) {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(TokenKind::Identifier);
                }
            } else {
                self.bump_line();
                self.advance();
            }
        }

        Err(self.unterminated(start, line, column))
    }

    /// Scan a string literal
    fn scan_string(&mut self, line: u32, column: u32) -> Result<TokenKind> {
        let start = self.pos;
        self.advance(); // consume opening quote

        while !self.is_eof() {
            if self.current() == b'\'' {
                // Check for escaped quote
                if self.peek() == Some(b'\'') {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(TokenKind::String);
                }
            } else {
                self.bump_line();
                self.advance();
            }
        }

        Err(self.unterminated(start, line, column))
    }

    /// Scan a blob literal (X'...')
    fn scan_blob(&mut self, line: u32, column: u32) -> Result<TokenKind> {
        let start = self.pos;
        self.advance(); // consume 'x' or 'X'
        self.advance(); // consume opening quote

        let mut digits = 0usize;
        while !self.is_eof() && self.current() != b'\'' {
            if !self.current().is_ascii_hexdigit() {
                return Err(self.unterminated(start, line, column));
            }
            digits += 1;
            self.advance();
        }

        if self.is_eof() || digits % 2 != 0 {
            return Err(self.unterminated(start, line, column));
        }
        self.advance(); // consume closing quote

        Ok(TokenKind::Blob)
    }

    /// Scan an operator or punctuation
    fn scan_operator(&mut self) -> TokenKind {
        let c = self.current();
        self.advance();

        match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'=' => {
                if !self.is_eof() && self.current() == b'=' {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'<' => match self.bytes.get(self.pos) {
                Some(b'=') => {
                    self.advance();
                    TokenKind::Le
                }
                Some(b'>') => {
                    self.advance();
                    TokenKind::Ne
                }
                Some(b'<') => {
                    self.advance();
                    TokenKind::LtLt
                }
                _ => TokenKind::Lt,
            },
            b'>' => match self.bytes.get(self.pos) {
                Some(b'=') => {
                    self.advance();
                    TokenKind::Ge
                }
                Some(b'>') => {
                    self.advance();
                    TokenKind::GtGt
                }
                _ => TokenKind::Gt,
            },
            b'!' => {
                if !self.is_eof() && self.current() == b'=' {
                    self.advance();
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            b'&' => TokenKind::Ampersand,
            b'|' => {
                if !self.is_eof() && self.current() == b'|' {
                    self.advance();
                    TokenKind::DoublePipe
                } else {
                    TokenKind::Pipe
                }
            }
            b'~' => TokenKind::Tilde,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'.' => TokenKind::Dot,
            _ => TokenKind::Illegal,
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            // Skip whitespace
            while !self.is_eof() && self.current().is_ascii_whitespace() {
                self.bump_line();
                self.advance();
            }

            if self.is_eof() {
                break;
            }

            // Skip -- comments
            if self.current() == b'-' && self.peek() == Some(b'-') {
                while !self.is_eof() && self.current() != b'\n' {
                    self.advance();
                }
                continue;
            }

            // Skip /* */ comments
            if self.current() == b'/' && self.peek() == Some(b'*') {
                let (start, line, column) = (self.pos, self.line, self.column);
                self.advance();
                self.advance();
                loop {
                    if self.is_eof() {
                        return Err(self.unterminated(start, line, column));
                    }
                    if self.current() == b'*' && self.peek() == Some(b'/') {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.bump_line();
                    self.advance();
                }
                continue;
            }

            break;
        }

        Ok(())
    }

    fn unterminated(&self, start: usize, line: u32, column: u32) -> Error {
        let text: String = self.source[start..].chars().take(32).collect();
        Error::Lex { text, line, column }
    }

    /// Track newlines inside whitespace, strings and comments
    fn bump_line(&mut self) {
        if self.current() == b'\n' {
            self.line += 1;
            self.column = 0;
        }
    }

    /// Check if at end of input
    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Get current byte
    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    /// Peek at next byte
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    /// Advance to next byte
    fn advance(&mut self) {
        self.pos += 1;
        self.column += 1;
    }
}

// ============================================================================
// Character Classes
// ============================================================================

/// First byte of a bare identifier
fn is_id_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

/// Subsequent bytes of a bare identifier
fn is_id_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80
}

/// Map a text to a keyword or identifier token
fn keyword_or_identifier(text: &str) -> TokenKind {
    if !text.is_ascii() {
        return TokenKind::Identifier;
    }
    KEYWORDS
        .get(text.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(TokenKind::Identifier)
}

// ============================================================================
// Public API
// ============================================================================

/// Tokenize a SQL string
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(source);
    tokenizer.tokenize()
}

// ============================================================================
// Tests
// ============================================================================
