//! Abstract Syntax Tree
//!
//! Defines the AST nodes for the statements the engine understands: table
//! and index definitions, constrained inserts, single-table selects and
//! pragmas. Constraint bodies keep their verbatim source text alongside the
//! parsed expression so the catalog can report them exactly as written.

use std::fmt;

use crate::parser::ident::Identifier;

// ============================================================================
// Core Types
// ============================================================================

/// Sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Conflict resolution action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictAction {
    #[default]
    Abort,
    Rollback,
    Fail,
    Ignore,
    Replace,
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictAction::Abort => "ABORT",
            ConflictAction::Rollback => "ROLLBACK",
            ConflictAction::Fail => "FAIL",
            ConflictAction::Ignore => "IGNORE",
            ConflictAction::Replace => "REPLACE",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Pragma(PragmaStmt),
}

// ============================================================================
// SELECT Statement
// ============================================================================

/// Single-table SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub columns: Vec<ResultColumn>,
    pub from: Option<String>,
    pub where_clause: Option<Box<Expr>>,
    pub limit: Option<LimitClause>,
}

impl SelectStmt {
    /// `SELECT * FROM table`
    pub fn star_from(table: impl Into<String>) -> Self {
        SelectStmt {
            columns: vec![ResultColumn::Star],
            from: Some(table.into()),
            where_clause: None,
            limit: None,
        }
    }

    /// True for the `SELECT * FROM t ...` shape
    pub fn is_star(&self) -> bool {
        matches!(self.columns.as_slice(), [ResultColumn::Star])
    }
}

/// Result column
#[derive(Debug, Clone, PartialEq)]
pub enum ResultColumn {
    Star,
    TableStar(String),
    Expr {
        expr: Expr,
        alias: Option<String>,
        /// Source text, used as the column heading when there is no alias
        text: String,
    },
}

/// LIMIT clause
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub limit: Box<Expr>,
    pub offset: Option<Box<Expr>>,
}

// ============================================================================
// INSERT Statement
// ============================================================================

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub or_action: Option<ConflictAction>,
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub source: InsertSource,
}

/// INSERT source
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<SelectStmt>),
    DefaultValues,
}

// ============================================================================
// CREATE TABLE Statement
// ============================================================================

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub temporary: bool,
    pub if_not_exists: bool,
    pub name: Identifier,
    pub definition: TableDefinition,
    /// Statement text as written, without the trailing semicolon
    pub sql: String,
}

/// Table definition
#[derive(Debug, Clone, PartialEq)]
pub enum TableDefinition {
    Columns {
        columns: Vec<ColumnDef>,
        constraints: Vec<TableConstraint>,
    },
    AsSelect(Box<SelectStmt>),
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Identifier,
    pub type_name: Option<TypeName>,
    pub constraints: Vec<ColumnConstraint>,
}

/// Declared type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    /// Type words joined by single spaces (`VARYING CHARACTER`)
    pub name: String,
    /// Verbatim source span, arguments included (`VARCHAR(80)`)
    pub text: String,
}

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        TypeName {
            text: name.clone(),
            name,
        }
    }
}

/// Column constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    pub name: Option<String>,
    pub kind: ColumnConstraintKind,
}

/// Column constraint kind
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraintKind {
    PrimaryKey {
        order: Option<SortOrder>,
        conflict: Option<ConflictAction>,
        autoincrement: bool,
    },
    NotNull {
        conflict: Option<ConflictAction>,
    },
    /// Explicit `NULL`, a no-op
    Null,
    Unique {
        conflict: Option<ConflictAction>,
    },
    Check(CheckBody),
    Default(DefaultValue),
    Collate(String),
    ForeignKey(ForeignKeyClause),
}

/// CHECK body
#[derive(Debug, Clone, PartialEq)]
pub struct CheckBody {
    pub expr: Box<Expr>,
    /// Text between the parentheses
    pub text: String,
}

/// DEFAULT value
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultValue {
    pub expr: Box<Expr>,
    /// Literal span, or the inner span of a parenthesized expression
    pub text: String,
}

/// Foreign key clause
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyClause {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub on_delete: Option<ForeignKeyAction>,
    pub on_update: Option<ForeignKeyAction>,
    pub deferrable: Option<Deferrable>,
}

/// Foreign key action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    SetNull,
    SetDefault,
    Cascade,
    Restrict,
    NoAction,
}

impl ForeignKeyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }
}

/// Deferrable constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deferrable {
    pub not: bool,
    pub initially: Option<DeferrableInitially>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferrableInitially {
    Deferred,
    Immediate,
}

/// Table constraint
#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<String>,
    pub kind: TableConstraintKind,
}

/// Table constraint kind
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey {
        columns: Vec<IndexedColumn>,
        conflict: Option<ConflictAction>,
    },
    Unique {
        columns: Vec<IndexedColumn>,
        conflict: Option<ConflictAction>,
    },
    Check(CheckBody),
    ForeignKey {
        columns: Vec<String>,
        clause: ForeignKeyClause,
    },
}

/// Indexed column
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedColumn {
    pub name: String,
    pub collation: Option<String>,
    pub order: Option<SortOrder>,
}

// ============================================================================
// CREATE INDEX Statement
// ============================================================================

/// CREATE INDEX statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub unique: bool,
    pub if_not_exists: bool,
    pub name: Identifier,
    pub table: String,
    pub columns: Vec<IndexedColumn>,
    pub where_clause: Option<Box<Expr>>,
    pub sql: String,
}

// ============================================================================
// PRAGMA Statement
// ============================================================================

/// PRAGMA statement
#[derive(Debug, Clone, PartialEq)]
pub struct PragmaStmt {
    pub name: String,
    pub value: Option<PragmaValue>,
}

/// PRAGMA value
#[derive(Debug, Clone, PartialEq)]
pub enum PragmaValue {
    Set(Expr),
    Call(Expr),
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Literal(Literal),

    // Column reference
    Column(ColumnRef),

    // Unary operators
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },

    // Binary operators
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // BETWEEN
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    // IN (value list)
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    // LIKE/GLOB
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        op: LikeOp,
        negated: bool,
    },

    // IS NULL / IS NOT NULL
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    // CASE expression
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<WhenClause>,
        else_clause: Option<Box<Expr>>,
    },

    // CAST expression
    Cast {
        expr: Box<Expr>,
        type_name: TypeName,
    },

    // COLLATE
    Collate {
        expr: Box<Expr>,
        collation: String,
    },

    // Function call
    Function(FunctionCall),

    // Parenthesized expression
    Parens(Box<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Expr::Literal(Literal::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(name))
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
    CurrentTime,
    CurrentDate,
    CurrentTimestamp,
}

/// Column reference
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        ColumnRef {
            table: None,
            column: column.into(),
        }
    }

    pub fn with_table(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,    // -
    Pos,    // +
    Not,    // NOT
    BitNot, // ~
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    ShiftLeft,
    ShiftRight,

    // String
    Concat,
}

impl BinaryOp {
    /// Get the precedence of this operator (higher = tighter binding)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Is
            | BinaryOp::IsNot => 3,
            BinaryOp::BitOr => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 6,
            BinaryOp::Add | BinaryOp::Sub => 7,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 8,
            BinaryOp::Concat => 9,
        }
    }
}

/// LIKE operator type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOp {
    Like,
    Glob,
}

/// WHEN clause in CASE
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub when: Box<Expr>,
    pub then: Box<Expr>,
}

/// Function call
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: FunctionArgs,
}

/// Function arguments
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArgs {
    Star,
    Exprs(Vec<Expr>),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_helpers() {
        let e = Expr::int(42);
        assert!(matches!(e, Expr::Literal(Literal::Integer(42))));

        let e = Expr::string("hello");
        assert!(matches!(e, Expr::Literal(Literal::String(_))));

        let e = Expr::column("id");
        assert!(matches!(e, Expr::Column(ColumnRef { column, .. }) if column == "id"));
    }

    #[test]
    fn test_binary_op_precedence() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
        assert!(BinaryOp::Eq.precedence() > BinaryOp::And.precedence());
    }

    #[test]
    fn test_select_star_shape() {
        let stmt = SelectStmt::star_from("users");
        assert!(stmt.is_star());
        assert_eq!(stmt.from.as_deref(), Some("users"));
    }

    #[test]
    fn test_conflict_action_display() {
        assert_eq!(ConflictAction::Replace.to_string(), "REPLACE");
        assert_eq!(ForeignKeyAction::NoAction.as_str(), "NO ACTION");
    }
}
