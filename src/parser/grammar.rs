//! SQL Grammar/Parser
//!
//! A recursive descent parser for the engine's statement set. Uses the
//! tokenizer to read tokens and builds AST nodes according to SQL grammar.
//!
//! Every table, column and index name goes through the identifier
//! validator. A bare name is assembled from all tokens glued to it without
//! whitespace, so `est!@#` reaches the validator whole instead of failing
//! on the first odd token.

use crate::error::{Error, Result};
use crate::parser::ast::*;
use crate::parser::ident::{self, Identifier, QuoteStyle};
use crate::parser::tokenizer::{tokenize, Token, TokenKind};

// ============================================================================
// Parser
// ============================================================================

/// SQL parser
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given SQL source
    pub fn new(source: &'a str) -> Result<Self> {
        let tokens = tokenize(source)?;
        Ok(Parser {
            source,
            tokens,
            pos: 0,
        })
    }

    /// Parse a single SQL statement
    pub fn parse_stmt(&mut self) -> Result<Stmt> {
        self.skip_semicolons();

        if self.is_eof() {
            return Err(self.error("expected statement"));
        }

        let stmt = match self.current().kind {
            TokenKind::Create => self.parse_create(),
            TokenKind::Insert | TokenKind::Replace => Ok(Stmt::Insert(self.parse_insert_stmt()?)),
            TokenKind::Select => Ok(Stmt::Select(self.parse_select_stmt()?)),
            TokenKind::Pragma => Ok(Stmt::Pragma(self.parse_pragma()?)),
            _ => Err(self.syntax_error()),
        }?;

        if !self.check(TokenKind::Semicolon) && !self.is_eof() {
            return Err(self.syntax_error());
        }

        self.skip_semicolons();
        Ok(stmt)
    }

    /// Check if at end of file
    pub fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    // ========================================================================
    // SELECT Statement
    // ========================================================================

    fn parse_select_stmt(&mut self) -> Result<SelectStmt> {
        self.expect(TokenKind::Select)?;

        let columns = self.parse_result_columns()?;

        let from = if self.match_token(TokenKind::From) {
            let (_, table) = self.parse_maybe_qualified_name()?;
            Some(table)
        } else {
            None
        };

        let where_clause = if self.match_token(TokenKind::Where) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        let limit = if self.match_token(TokenKind::Limit) {
            Some(self.parse_limit_clause()?)
        } else {
            None
        };

        Ok(SelectStmt {
            columns,
            from,
            where_clause,
            limit,
        })
    }

    fn parse_result_columns(&mut self) -> Result<Vec<ResultColumn>> {
        let mut columns = vec![self.parse_result_column()?];
        while self.match_token(TokenKind::Comma) {
            columns.push(self.parse_result_column()?);
        }
        Ok(columns)
    }

    fn parse_result_column(&mut self) -> Result<ResultColumn> {
        if self.match_token(TokenKind::Star) {
            return Ok(ResultColumn::Star);
        }

        // table.*
        if self.is_name_token()
            && self.peek().kind == TokenKind::Dot
            && self.peek_at(2).kind == TokenKind::Star
        {
            let table = self.expect_identifier()?;
            self.advance(); // .
            self.advance(); // *
            return Ok(ResultColumn::TableStar(table));
        }

        let start = self.current().start;
        let expr = self.parse_expr()?;
        let text = self.source[start..self.prev_end()].to_string();

        let alias = if self.match_token(TokenKind::As) {
            Some(self.expect_identifier()?)
        } else if self.check(TokenKind::Identifier) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        Ok(ResultColumn::Expr { expr, alias, text })
    }

    fn parse_limit_clause(&mut self) -> Result<LimitClause> {
        let first = self.parse_expr()?;

        if self.match_token(TokenKind::Offset) {
            let offset = self.parse_expr()?;
            return Ok(LimitClause {
                limit: Box::new(first),
                offset: Some(Box::new(offset)),
            });
        }

        // LIMIT offset, count
        if self.match_token(TokenKind::Comma) {
            let limit = self.parse_expr()?;
            return Ok(LimitClause {
                limit: Box::new(limit),
                offset: Some(Box::new(first)),
            });
        }

        Ok(LimitClause {
            limit: Box::new(first),
            offset: None,
        })
    }

    // ========================================================================
    // INSERT Statement
    // ========================================================================

    fn parse_insert_stmt(&mut self) -> Result<InsertStmt> {
        let or_action = if self.match_token(TokenKind::Replace) {
            Some(ConflictAction::Replace)
        } else {
            self.expect(TokenKind::Insert)?;
            if self.match_token(TokenKind::Or) {
                Some(self.parse_conflict_action()?)
            } else {
                None
            }
        };

        self.expect(TokenKind::Into)?;
        let (_, table) = self.parse_maybe_qualified_name()?;

        let columns = if self.match_token(TokenKind::LParen) {
            let cols = self.parse_identifier_list()?;
            self.expect(TokenKind::RParen)?;
            Some(cols)
        } else {
            None
        };

        let source = if self.match_token(TokenKind::Default) {
            self.expect(TokenKind::Values)?;
            InsertSource::DefaultValues
        } else if self.match_token(TokenKind::Values) {
            let mut rows = vec![self.parse_values_row()?];
            while self.match_token(TokenKind::Comma) {
                rows.push(self.parse_values_row()?);
            }
            InsertSource::Values(rows)
        } else if self.check(TokenKind::Select) {
            InsertSource::Select(Box::new(self.parse_select_stmt()?))
        } else {
            return Err(self.syntax_error());
        };

        Ok(InsertStmt {
            or_action,
            table,
            columns,
            source,
        })
    }

    fn parse_values_row(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let values = self.parse_expr_list()?;
        self.expect(TokenKind::RParen)?;
        Ok(values)
    }

    // ========================================================================
    // CREATE Statements
    // ========================================================================

    fn parse_create(&mut self) -> Result<Stmt> {
        let start = self.current().start;
        self.expect(TokenKind::Create)?;

        let temporary = self.match_token(TokenKind::Temp) || self.match_token(TokenKind::Temporary);
        let unique = !temporary && self.match_token(TokenKind::Unique);

        if !unique && self.match_token(TokenKind::Table) {
            let mut stmt = self.parse_create_table(temporary)?;
            stmt.sql = self.source[start..self.prev_end()].to_string();
            return Ok(Stmt::CreateTable(stmt));
        }

        if !temporary && self.match_token(TokenKind::Index) {
            let mut stmt = self.parse_create_index(unique)?;
            stmt.sql = self.source[start..self.prev_end()].to_string();
            return Ok(Stmt::CreateIndex(stmt));
        }

        Err(self.syntax_error())
    }

    fn parse_create_table(&mut self, temporary: bool) -> Result<CreateTableStmt> {
        let if_not_exists = self.parse_if_not_exists()?;

        let name = self.parse_object_name()?;

        let definition = if self.match_token(TokenKind::As) {
            TableDefinition::AsSelect(Box::new(self.parse_select_stmt()?))
        } else if self.match_token(TokenKind::LParen) {
            let columns = self.parse_column_defs()?;
            let constraints = self.parse_table_constraints()?;
            self.expect(TokenKind::RParen)?;
            TableDefinition::Columns {
                columns,
                constraints,
            }
        } else {
            return Err(self.syntax_error());
        };

        Ok(CreateTableStmt {
            temporary,
            if_not_exists,
            name,
            definition,
            sql: String::new(),
        })
    }

    fn parse_if_not_exists(&mut self) -> Result<bool> {
        if self.check(TokenKind::If) && self.peek().kind == TokenKind::Not {
            self.advance();
            self.advance();
            self.expect(TokenKind::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_column_defs(&mut self) -> Result<Vec<ColumnDef>> {
        let mut columns = Vec::new();

        loop {
            // A table constraint ends the column list
            if !columns.is_empty() && self.is_table_constraint_start() {
                break;
            }

            columns.push(self.parse_column_def()?);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        Ok(columns)
    }

    fn is_table_constraint_start(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Constraint
                | TokenKind::Primary
                | TokenKind::Unique
                | TokenKind::Check
                | TokenKind::Foreign
        )
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.parse_name()?;

        let type_name = if self.check(TokenKind::Identifier) {
            Some(self.parse_type_name()?)
        } else {
            None
        };

        let constraints = self.parse_column_constraints()?;

        Ok(ColumnDef {
            name,
            type_name,
            constraints,
        })
    }

    fn parse_type_name(&mut self) -> Result<TypeName> {
        let start = self.current().start;
        let mut name = self.expect_identifier()?;

        // Handle multi-word type names like "VARYING CHARACTER"
        while self.check(TokenKind::Identifier) {
            name.push(' ');
            name.push_str(&self.expect_identifier()?);
        }

        if self.match_token(TokenKind::LParen) {
            self.parse_signed_number()?;
            if self.match_token(TokenKind::Comma) {
                self.parse_signed_number()?;
            }
            self.expect(TokenKind::RParen)?;
        }

        let text = self.source[start..self.prev_end()].to_string();
        Ok(TypeName { name, text })
    }

    fn parse_signed_number(&mut self) -> Result<()> {
        if !self.match_token(TokenKind::Minus) {
            self.match_token(TokenKind::Plus);
        }
        if self.check(TokenKind::Integer) || self.check(TokenKind::Float) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    fn parse_column_constraints(&mut self) -> Result<Vec<ColumnConstraint>> {
        let mut constraints = Vec::new();

        loop {
            let name = if self.match_token(TokenKind::Constraint) {
                Some(self.expect_identifier()?)
            } else {
                None
            };

            let kind = if self.match_token(TokenKind::Primary) {
                self.expect(TokenKind::Key)?;
                let order = self.parse_sort_order();
                let conflict = self.parse_conflict_clause()?;
                let autoincrement = self.match_token(TokenKind::Autoincrement);
                ColumnConstraintKind::PrimaryKey {
                    order,
                    conflict,
                    autoincrement,
                }
            } else if self.match_token(TokenKind::Not) {
                self.expect(TokenKind::Null)?;
                let conflict = self.parse_conflict_clause()?;
                ColumnConstraintKind::NotNull { conflict }
            } else if self.match_token(TokenKind::Null) {
                ColumnConstraintKind::Null
            } else if self.match_token(TokenKind::Unique) {
                let conflict = self.parse_conflict_clause()?;
                ColumnConstraintKind::Unique { conflict }
            } else if self.match_token(TokenKind::Check) {
                ColumnConstraintKind::Check(self.parse_check_body()?)
            } else if self.match_token(TokenKind::Default) {
                ColumnConstraintKind::Default(self.parse_default_value()?)
            } else if self.match_token(TokenKind::Collate) {
                ColumnConstraintKind::Collate(self.expect_identifier()?)
            } else if self.match_token(TokenKind::References) {
                ColumnConstraintKind::ForeignKey(self.parse_foreign_key_clause()?)
            } else if name.is_some() {
                return Err(self.syntax_error());
            } else {
                break;
            };

            constraints.push(ColumnConstraint { name, kind });
        }

        Ok(constraints)
    }

    fn parse_check_body(&mut self) -> Result<CheckBody> {
        self.expect(TokenKind::LParen)?;
        let start = self.current().start;
        let expr = self.parse_expr()?;
        let text = self.source[start..self.prev_end()].to_string();
        self.expect(TokenKind::RParen)?;

        Ok(CheckBody {
            expr: Box::new(expr),
            text,
        })
    }

    fn parse_default_value(&mut self) -> Result<DefaultValue> {
        // DEFAULT (expr) keeps only the inner text
        if self.match_token(TokenKind::LParen) {
            let start = self.current().start;
            let expr = self.parse_expr()?;
            let text = self.source[start..self.prev_end()].to_string();
            self.expect(TokenKind::RParen)?;
            return Ok(DefaultValue {
                expr: Box::new(expr),
                text,
            });
        }

        let start = self.current().start;

        let expr = match self.current().kind {
            TokenKind::Minus | TokenKind::Plus => {
                let op = if self.check(TokenKind::Minus) {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Pos
                };
                self.advance();
                if !self.check(TokenKind::Integer) && !self.check(TokenKind::Float) {
                    return Err(self.syntax_error());
                }
                match op {
                    UnaryOp::Neg if self.at_min_integer_magnitude() => {
                        self.advance();
                        Expr::Literal(Literal::Integer(i64::MIN))
                    }
                    _ => Expr::Unary {
                        op,
                        expr: Box::new(Expr::Literal(self.parse_literal()?)),
                    },
                }
            }
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Blob
            | TokenKind::Null
            | TokenKind::CurrentTime
            | TokenKind::CurrentDate
            | TokenKind::CurrentTimestamp => Expr::Literal(self.parse_literal()?),
            _ if self.is_name_token() && !self.current_is_quoted() => {
                // Bare words are string literals (TRUE/FALSE are 1/0)
                let word = self.current_text();
                self.advance();
                if word.eq_ignore_ascii_case("true") {
                    Expr::int(1)
                } else if word.eq_ignore_ascii_case("false") {
                    Expr::int(0)
                } else {
                    Expr::string(word)
                }
            }
            _ => return Err(self.syntax_error()),
        };

        let text = self.source[start..self.prev_end()].to_string();
        Ok(DefaultValue {
            expr: Box::new(expr),
            text,
        })
    }

    fn parse_foreign_key_clause(&mut self) -> Result<ForeignKeyClause> {
        let table = self.expect_identifier()?;

        let columns = if self.match_token(TokenKind::LParen) {
            let cols = self.parse_identifier_list()?;
            self.expect(TokenKind::RParen)?;
            Some(cols)
        } else {
            None
        };

        let mut on_delete = None;
        let mut on_update = None;

        while self.match_token(TokenKind::On) {
            if self.match_token(TokenKind::Delete) {
                on_delete = Some(self.parse_foreign_key_action()?);
            } else {
                self.expect(TokenKind::Update)?;
                on_update = Some(self.parse_foreign_key_action()?);
            }
        }

        let deferrable = self.parse_deferrable()?;

        Ok(ForeignKeyClause {
            table,
            columns,
            on_delete,
            on_update,
            deferrable,
        })
    }

    fn parse_foreign_key_action(&mut self) -> Result<ForeignKeyAction> {
        if self.match_token(TokenKind::Set) {
            if self.match_token(TokenKind::Null) {
                Ok(ForeignKeyAction::SetNull)
            } else {
                self.expect(TokenKind::Default)?;
                Ok(ForeignKeyAction::SetDefault)
            }
        } else if self.match_token(TokenKind::Cascade) {
            Ok(ForeignKeyAction::Cascade)
        } else if self.match_token(TokenKind::Restrict) {
            Ok(ForeignKeyAction::Restrict)
        } else if self.match_token(TokenKind::No) {
            self.expect(TokenKind::Action)?;
            Ok(ForeignKeyAction::NoAction)
        } else {
            Err(self.syntax_error())
        }
    }

    fn parse_deferrable(&mut self) -> Result<Option<Deferrable>> {
        let not = self.check(TokenKind::Not) && self.peek().kind == TokenKind::Deferrable;
        if not {
            self.advance();
        }
        if !self.match_token(TokenKind::Deferrable) {
            return Ok(None);
        }

        let initially = if self.match_token(TokenKind::Initially) {
            if self.match_token(TokenKind::Deferred) {
                Some(DeferrableInitially::Deferred)
            } else {
                self.expect(TokenKind::Immediate)?;
                Some(DeferrableInitially::Immediate)
            }
        } else {
            None
        };

        Ok(Some(Deferrable { not, initially }))
    }

    fn parse_table_constraints(&mut self) -> Result<Vec<TableConstraint>> {
        let mut constraints = Vec::new();

        while self.is_table_constraint_start() {
            let name = if self.match_token(TokenKind::Constraint) {
                Some(self.expect_identifier()?)
            } else {
                None
            };

            let kind = if self.match_token(TokenKind::Primary) {
                self.expect(TokenKind::Key)?;
                self.expect(TokenKind::LParen)?;
                let columns = self.parse_indexed_columns()?;
                self.expect(TokenKind::RParen)?;
                let conflict = self.parse_conflict_clause()?;
                TableConstraintKind::PrimaryKey { columns, conflict }
            } else if self.match_token(TokenKind::Unique) {
                self.expect(TokenKind::LParen)?;
                let columns = self.parse_indexed_columns()?;
                self.expect(TokenKind::RParen)?;
                let conflict = self.parse_conflict_clause()?;
                TableConstraintKind::Unique { columns, conflict }
            } else if self.match_token(TokenKind::Check) {
                TableConstraintKind::Check(self.parse_check_body()?)
            } else if self.match_token(TokenKind::Foreign) {
                self.expect(TokenKind::Key)?;
                self.expect(TokenKind::LParen)?;
                let columns = self.parse_identifier_list()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::References)?;
                let clause = self.parse_foreign_key_clause()?;
                TableConstraintKind::ForeignKey { columns, clause }
            } else {
                return Err(self.syntax_error());
            };

            constraints.push(TableConstraint { name, kind });

            // Commas between table constraints are optional, but one must
            // not dangle before the closing parenthesis
            if self.match_token(TokenKind::Comma) && !self.is_table_constraint_start() {
                return Err(self.syntax_error());
            }
        }

        Ok(constraints)
    }

    fn parse_indexed_columns(&mut self) -> Result<Vec<IndexedColumn>> {
        let mut columns = vec![self.parse_indexed_column()?];
        while self.match_token(TokenKind::Comma) {
            columns.push(self.parse_indexed_column()?);
        }
        Ok(columns)
    }

    fn parse_indexed_column(&mut self) -> Result<IndexedColumn> {
        let name = self.expect_identifier()?;

        let collation = if self.match_token(TokenKind::Collate) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let order = self.parse_sort_order();

        Ok(IndexedColumn {
            name,
            collation,
            order,
        })
    }

    fn parse_sort_order(&mut self) -> Option<SortOrder> {
        if self.match_token(TokenKind::Asc) {
            Some(SortOrder::Asc)
        } else if self.match_token(TokenKind::Desc) {
            Some(SortOrder::Desc)
        } else {
            None
        }
    }

    fn parse_conflict_clause(&mut self) -> Result<Option<ConflictAction>> {
        if self.match_token(TokenKind::On) {
            self.expect(TokenKind::Conflict)?;
            Ok(Some(self.parse_conflict_action()?))
        } else {
            Ok(None)
        }
    }

    fn parse_conflict_action(&mut self) -> Result<ConflictAction> {
        if self.match_token(TokenKind::Rollback) {
            Ok(ConflictAction::Rollback)
        } else if self.match_token(TokenKind::Abort) {
            Ok(ConflictAction::Abort)
        } else if self.match_token(TokenKind::Fail) {
            Ok(ConflictAction::Fail)
        } else if self.match_token(TokenKind::Ignore) {
            Ok(ConflictAction::Ignore)
        } else if self.match_token(TokenKind::Replace) {
            Ok(ConflictAction::Replace)
        } else {
            Err(self.syntax_error())
        }
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<CreateIndexStmt> {
        let if_not_exists = self.parse_if_not_exists()?;

        let name = self.parse_object_name()?;
        self.expect(TokenKind::On)?;
        let table = self.expect_identifier()?;

        self.expect(TokenKind::LParen)?;
        let columns = self.parse_indexed_columns()?;
        self.expect(TokenKind::RParen)?;

        let where_clause = if self.match_token(TokenKind::Where) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        Ok(CreateIndexStmt {
            unique,
            if_not_exists,
            name,
            table,
            columns,
            where_clause,
            sql: String::new(),
        })
    }

    // ========================================================================
    // PRAGMA Statement
    // ========================================================================

    fn parse_pragma(&mut self) -> Result<PragmaStmt> {
        self.expect(TokenKind::Pragma)?;

        let (_, name) = self.parse_maybe_qualified_name()?;

        let value = if self.match_token(TokenKind::Eq) {
            Some(PragmaValue::Set(self.parse_pragma_value()?))
        } else if self.match_token(TokenKind::LParen) {
            let expr = self.parse_pragma_value()?;
            self.expect(TokenKind::RParen)?;
            Some(PragmaValue::Call(expr))
        } else {
            None
        };

        Ok(PragmaStmt { name, value })
    }

    /// Pragma arguments: numbers, strings, or a bare word such as ON or a table name
    fn parse_pragma_value(&mut self) -> Result<Expr> {
        match self.current().kind {
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Minus
            | TokenKind::Plus => self.parse_unary_expr(),
            TokenKind::Identifier => Ok(Expr::string(self.expect_identifier()?)),
            kind if kind.is_keyword() => {
                let word = self.current_text();
                self.advance();
                Ok(Expr::string(word))
            }
            _ => Err(self.syntax_error()),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;

        while self.match_token(TokenKind::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;

        while self.match_token(TokenKind::And) {
            let right = self.parse_not_expr()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.match_token(TokenKind::Not) {
            let expr = self.parse_not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }

        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitwise_or_expr()?;

        // Handle comparison operators and special forms
        loop {
            let op = match self.current().kind {
                TokenKind::Eq | TokenKind::EqEq => Some(BinaryOp::Eq),
                TokenKind::Ne | TokenKind::BangEq => Some(BinaryOp::Ne),
                TokenKind::Lt => Some(BinaryOp::Lt),
                TokenKind::Le => Some(BinaryOp::Le),
                TokenKind::Gt => Some(BinaryOp::Gt),
                TokenKind::Ge => Some(BinaryOp::Ge),
                _ => None,
            };

            if let Some(op) = op {
                self.advance();
                let right = self.parse_bitwise_or_expr()?;
                left = Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else if self.match_token(TokenKind::Is) {
                let negated = self.match_token(TokenKind::Not);
                if self.match_token(TokenKind::Null) {
                    left = Expr::IsNull {
                        expr: Box::new(left),
                        negated,
                    };
                } else {
                    let right = self.parse_bitwise_or_expr()?;
                    left = Expr::Binary {
                        op: if negated {
                            BinaryOp::IsNot
                        } else {
                            BinaryOp::Is
                        },
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
            } else if self.match_token(TokenKind::Isnull) {
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated: false,
                };
            } else if self.match_token(TokenKind::Notnull) {
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated: true,
                };
            } else if self.match_token(TokenKind::Not) {
                left = self.parse_not_suffix(left)?;
            } else if self.match_token(TokenKind::Between) {
                left = self.parse_between_expr(left, false)?;
            } else if self.match_token(TokenKind::In) {
                left = self.parse_in_expr(left, false)?;
            } else if self.match_token(TokenKind::Like) {
                left = self.parse_like_expr(left, LikeOp::Like, false)?;
            } else if self.match_token(TokenKind::Glob) {
                left = self.parse_like_expr(left, LikeOp::Glob, false)?;
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_not_suffix(&mut self, left: Expr) -> Result<Expr> {
        if self.match_token(TokenKind::Between) {
            self.parse_between_expr(left, true)
        } else if self.match_token(TokenKind::In) {
            self.parse_in_expr(left, true)
        } else if self.match_token(TokenKind::Like) {
            self.parse_like_expr(left, LikeOp::Like, true)
        } else if self.match_token(TokenKind::Glob) {
            self.parse_like_expr(left, LikeOp::Glob, true)
        } else if self.match_token(TokenKind::Null) {
            Ok(Expr::IsNull {
                expr: Box::new(left),
                negated: true,
            })
        } else {
            Err(self.syntax_error())
        }
    }

    fn parse_between_expr(&mut self, left: Expr, negated: bool) -> Result<Expr> {
        let low = self.parse_bitwise_or_expr()?;
        self.expect(TokenKind::And)?;
        let high = self.parse_bitwise_or_expr()?;
        Ok(Expr::Between {
            expr: Box::new(left),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    fn parse_in_expr(&mut self, left: Expr, negated: bool) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;

        let list = if self.check(TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_expr_list()?
        };

        self.expect(TokenKind::RParen)?;

        Ok(Expr::In {
            expr: Box::new(left),
            list,
            negated,
        })
    }

    fn parse_like_expr(&mut self, left: Expr, op: LikeOp, negated: bool) -> Result<Expr> {
        let pattern = self.parse_bitwise_or_expr()?;

        let escape = if self.match_token(TokenKind::Escape) {
            Some(Box::new(self.parse_bitwise_or_expr()?))
        } else {
            None
        };

        Ok(Expr::Like {
            expr: Box::new(left),
            pattern: Box::new(pattern),
            escape,
            op,
            negated,
        })
    }

    fn parse_bitwise_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitwise_and_expr()?;

        while self.match_token(TokenKind::Pipe) {
            let right = self.parse_bitwise_and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::BitOr,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_bitwise_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_shift_expr()?;

        while self.match_token(TokenKind::Ampersand) {
            let right = self.parse_shift_expr()?;
            left = Expr::Binary {
                op: BinaryOp::BitAnd,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_shift_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive_expr()?;

        loop {
            let op = if self.match_token(TokenKind::LtLt) {
                BinaryOp::ShiftLeft
            } else if self.match_token(TokenKind::GtGt) {
                BinaryOp::ShiftRight
            } else {
                break;
            };

            let right = self.parse_additive_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;

        loop {
            let op = if self.match_token(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_token(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };

            let right = self.parse_multiplicative_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_concat_expr()?;

        loop {
            let op = if self.match_token(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_token(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_token(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };

            let right = self.parse_concat_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_concat_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;

        while self.match_token(TokenKind::DoublePipe) {
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let op = if self.match_token(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.match_token(TokenKind::Plus) {
            UnaryOp::Pos
        } else if self.match_token(TokenKind::Tilde) {
            UnaryOp::BitNot
        } else {
            return self.parse_collate_expr();
        };

        if op == UnaryOp::Neg && self.at_min_integer_magnitude() {
            self.advance();
            return Ok(Expr::Literal(Literal::Integer(i64::MIN)));
        }

        let expr = self.parse_unary_expr()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    /// The one decimal literal that only fits i64 once negated
    fn at_min_integer_magnitude(&self) -> bool {
        self.check(TokenKind::Integer) && self.current_text() == MIN_INTEGER_MAGNITUDE
    }

    fn parse_collate_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary_expr()?;

        if self.match_token(TokenKind::Collate) {
            let collation = self.expect_identifier()?;
            expr = Expr::Collate {
                expr: Box::new(expr),
                collation,
            };
        }

        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        // Literals
        if matches!(
            self.current().kind,
            TokenKind::Integer
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::Blob
                | TokenKind::Null
                | TokenKind::CurrentTime
                | TokenKind::CurrentDate
                | TokenKind::CurrentTimestamp
        ) {
            return Ok(Expr::Literal(self.parse_literal()?));
        }

        // CASE expression
        if self.match_token(TokenKind::Case) {
            return self.parse_case_expr();
        }

        // CAST expression
        if self.match_token(TokenKind::Cast) {
            return self.parse_cast_expr();
        }

        // NOT expression
        if self.match_token(TokenKind::Not) {
            let expr = self.parse_primary_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }

        // Parenthesized expression
        if self.match_token(TokenKind::LParen) {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Parens(Box::new(expr)));
        }

        // Identifier (column reference or function call)
        if self.is_name_token() {
            return self.parse_identifier_or_function();
        }

        Err(self.syntax_error())
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let token = self.current().clone();
        let text = token.text(self.source);

        let literal = match token.kind {
            TokenKind::Null => Literal::Null,
            TokenKind::Integer => integer_literal(text).ok_or_else(|| self.syntax_error())?,
            TokenKind::Float => Literal::Float(text.parse().map_err(|_| self.syntax_error())?),
            TokenKind::String => {
                // Remove quotes and unescape
                let inner = &text[1..text.len() - 1];
                Literal::String(inner.replace("''", "'"))
            }
            TokenKind::Blob => {
                // X'...' or x'...'
                let hex_digits = &text[2..text.len() - 1];
                Literal::Blob(hex::decode(hex_digits).map_err(|_| self.syntax_error())?)
            }
            TokenKind::CurrentTime => Literal::CurrentTime,
            TokenKind::CurrentDate => Literal::CurrentDate,
            TokenKind::CurrentTimestamp => Literal::CurrentTimestamp,
            _ => return Err(self.syntax_error()),
        };

        self.advance();
        Ok(literal)
    }

    fn parse_case_expr(&mut self) -> Result<Expr> {
        let operand = if !self.check(TokenKind::When) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        let mut when_clauses = Vec::new();
        while self.match_token(TokenKind::When) {
            let when = self.parse_expr()?;
            self.expect(TokenKind::Then)?;
            let then = self.parse_expr()?;
            when_clauses.push(WhenClause {
                when: Box::new(when),
                then: Box::new(then),
            });
        }

        if when_clauses.is_empty() {
            return Err(self.syntax_error());
        }

        let else_clause = if self.match_token(TokenKind::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        self.expect(TokenKind::End)?;

        Ok(Expr::Case {
            operand,
            when_clauses,
            else_clause,
        })
    }

    fn parse_cast_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::As)?;
        let type_name = self.parse_type_name()?;
        self.expect(TokenKind::RParen)?;

        Ok(Expr::Cast {
            expr: Box::new(expr),
            type_name,
        })
    }

    fn parse_identifier_or_function(&mut self) -> Result<Expr> {
        let first = self.expect_identifier()?;

        // Check for function call
        if self.match_token(TokenKind::LParen) {
            return self.parse_function_call(first);
        }

        // table.column
        if self.match_token(TokenKind::Dot) {
            let column = self.expect_identifier()?;
            return Ok(Expr::Column(ColumnRef::with_table(first, column)));
        }

        // Simple column reference
        Ok(Expr::Column(ColumnRef::new(first)))
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        let args = if self.match_token(TokenKind::Star) {
            FunctionArgs::Star
        } else if self.check(TokenKind::RParen) {
            FunctionArgs::Exprs(Vec::new())
        } else {
            FunctionArgs::Exprs(self.parse_expr_list()?)
        };

        self.expect(TokenKind::RParen)?;

        Ok(Expr::Function(FunctionCall { name, args }))
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// Name of a new table or index, with an optional `main.`/`temp.` prefix
    fn parse_object_name(&mut self) -> Result<Identifier> {
        if self.check(TokenKind::Identifier)
            && !self.current_is_quoted()
            && self.peek().kind == TokenKind::Dot
            && self.peek().start == self.current().end
        {
            let schema = self.current_text();
            if !matches!(
                schema.to_ascii_lowercase().as_str(),
                "main" | "temp" | "temporary"
            ) {
                return Err(self.error(&format!("unknown database {}", schema)));
            }
            self.advance();
            self.advance();
        }

        self.parse_name()
    }

    /// A validated table, column or index name.
    ///
    /// Quoted names are taken as written. A bare name runs up to the next
    /// whitespace or separator, so `2.07.2023` and `est!@#` are checked as
    /// single names rather than failing on their second token.
    fn parse_name(&mut self) -> Result<Identifier> {
        let token = self.current().clone();

        if token.kind == TokenKind::String || token.is_quoted_identifier(self.source) {
            self.advance();
            return Ok(Identifier::from_raw(token.text(self.source)));
        }

        if token.kind.is_separator() || token.kind.is_reserved() {
            return Err(self.syntax_error());
        }

        let start = token.start;
        let mut end = token.end;
        self.advance();

        while !self.current().kind.is_separator()
            && self.current().start == end
            && !self.current_is_quoted()
            && self.current().kind != TokenKind::String
        {
            end = self.current().end;
            self.advance();
        }

        let raw = &self.source[start..end];
        ident::validate(raw, false)?;

        Ok(Identifier {
            value: raw.to_string(),
            quote: QuoteStyle::Bare,
        })
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_text(&self) -> &'a str {
        self.current().text(self.source)
    }

    fn current_is_quoted(&self) -> bool {
        self.current().is_quoted_identifier(self.source)
    }

    fn peek(&self) -> &Token {
        self.peek_at(1)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    /// End offset of the last consumed token
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Identifiers, plus keywords that may stand in for one
    fn is_name_token(&self) -> bool {
        let kind = self.current().kind;
        kind == TokenKind::Identifier || (kind.is_keyword() && !kind.is_reserved())
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    /// A reference to an existing name (unquoted, not validated)
    fn expect_identifier(&mut self) -> Result<String> {
        if self.is_name_token() || self.check(TokenKind::String) {
            let name = Identifier::from_raw(self.current_text()).value;
            self.advance();
            Ok(name)
        } else {
            Err(self.syntax_error())
        }
    }

    fn skip_semicolons(&mut self) {
        while self.match_token(TokenKind::Semicolon) {}
    }

    fn parse_maybe_qualified_name(&mut self) -> Result<(Option<String>, String)> {
        let first = self.expect_identifier()?;

        if self.match_token(TokenKind::Dot) {
            let second = self.expect_identifier()?;
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_identifier()?];
        while self.match_token(TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        Ok(names)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.match_token(TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    /// `near "tok": syntax error` at the current token
    fn syntax_error(&self) -> Error {
        let token = self.current();
        let message = if token.kind == TokenKind::Eof {
            "incomplete input".to_string()
        } else {
            format!("near \"{}\": syntax error", token.text(self.source))
        };
        Error::Syntax {
            message,
            line: token.line,
            column: token.column,
        }
    }

    fn error(&self, msg: &str) -> Error {
        let token = self.current();
        Error::Syntax {
            message: msg.to_string(),
            line: token.line,
            column: token.column,
        }
    }
}

const MIN_INTEGER_MAGNITUDE: &str = "9223372036854775808";

/// Decimal integers that overflow i64 become reals; hex wraps like SQLite
fn integer_literal(text: &str) -> Option<Literal> {
    if let Some(hex_digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex_digits, 16)
            .ok()
            .map(|v| Literal::Integer(v as i64));
    }
    match text.parse::<i64>() {
        Ok(v) => Some(Literal::Integer(v)),
        Err(_) => text.parse::<f64>().ok().map(Literal::Float),
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a single SQL statement
pub fn parse(sql: &str) -> Result<Stmt> {
    let mut parser = Parser::new(sql)?;
    parser.parse_stmt()
}

/// Parse multiple SQL statements
pub fn parse_all(sql: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(sql)?;
    let mut stmts = Vec::new();

    parser.skip_semicolons();
    while !parser.is_eof() {
        stmts.push(parser.parse_stmt()?);
    }

    Ok(stmts)
}

/// Parse a `CREATE TABLE` statement
pub fn parse_create_table(sql: &str) -> Result<CreateTableStmt> {
    let mut parser = Parser::new(sql)?;
    match parser.parse_stmt()? {
        Stmt::CreateTable(stmt) => Ok(stmt),
        _ => Err(Error::Syntax {
            message: "expected CREATE TABLE".to_string(),
            line: 1,
            column: 1,
        }),
    }
}

/// Parse a `CREATE INDEX` statement
pub fn parse_create_index(sql: &str) -> Result<CreateIndexStmt> {
    let mut parser = Parser::new(sql)?;
    match parser.parse_stmt()? {
        Stmt::CreateIndex(stmt) => Ok(stmt),
        _ => Err(Error::Syntax {
            message: "expected CREATE INDEX".to_string(),
            line: 1,
            column: 1,
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NameError;

    fn columns_of(stmt: &CreateTableStmt) -> &[ColumnDef] {
        match &stmt.definition {
            TableDefinition::Columns { columns, .. } => columns,
            TableDefinition::AsSelect(_) => panic!("expected column list"),
        }
    }

    fn syntax_message(sql: &str) -> String {
        match parse(sql) {
            Err(Error::Syntax { message, .. }) => message,
            other => panic!("expected syntax error for {sql}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_create_table() {
        let stmt = parse_create_table(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(80) NOT NULL)",
        )
        .unwrap();
        assert_eq!(stmt.name.value, "users");
        let cols = columns_of(&stmt);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[1].type_name.as_ref().unwrap().text, "VARCHAR(80)");
        assert!(matches!(
            cols[0].constraints[0].kind,
            ColumnConstraintKind::PrimaryKey { .. }
        ));
        assert_eq!(
            stmt.sql,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(80) NOT NULL)"
        );
    }

    #[test]
    fn test_parse_create_table_composite_key() {
        let stmt = parse_create_table(
            "CREATE TABLE enrollments (student_id INTEGER, course_id INTEGER, \
             PRIMARY KEY(student_id, course_id))",
        )
        .unwrap();
        match &stmt.definition {
            TableDefinition::Columns { constraints, .. } => match &constraints[0].kind {
                TableConstraintKind::PrimaryKey { columns, .. } => {
                    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
                    assert_eq!(names, vec!["student_id", "course_id"]);
                }
                other => panic!("unexpected constraint {other:?}"),
            },
            _ => panic!("expected column list"),
        }
    }

    #[test]
    fn test_default_text_is_verbatim() {
        let stmt = parse_create_table(
            "CREATE TABLE s (theme TEXT DEFAULT 'light', score REAL DEFAULT 0.0, \
             created DATE DEFAULT (DATE('now')), delta INTEGER DEFAULT -1)",
        )
        .unwrap();
        let texts: Vec<String> = columns_of(&stmt)
            .iter()
            .map(|c| match &c.constraints[0].kind {
                ColumnConstraintKind::Default(d) => d.text.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["'light'", "0.0", "DATE('now')", "-1"]);
    }

    #[test]
    fn test_check_text_is_verbatim() {
        let stmt =
            parse_create_table("CREATE TABLE p (price REAL CHECK (price > 0 AND price < 100))")
                .unwrap();
        match &columns_of(&stmt)[0].constraints[0].kind {
            ColumnConstraintKind::Check(body) => {
                assert_eq!(body.text, "price > 0 AND price < 100")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_check_fails() {
        assert_eq!(
            syntax_message("CREATE TABLE t (value INTEGER CHECK(value > ))"),
            "near \")\": syntax error"
        );
    }

    #[test]
    fn test_empty_column_list_fails() {
        assert_eq!(syntax_message("CREATE TABLE t ()"), "near \")\": syntax error");
    }

    #[test]
    fn test_missing_comma_fails() {
        assert_eq!(
            syntax_message("CREATE TABLE t (id INTEGER PRIMARY KEY name TEXT)"),
            "near \"name\": syntax error"
        );
    }

    #[test]
    fn test_two_word_table_name_fails() {
        let err = parse("CREATE TABLE my customer (id INTEGER)").unwrap_err();
        match err {
            Error::Syntax { message, line, column } => {
                assert_eq!(message, "near \"customer\": syntax error");
                assert_eq!((line, column), (1, 17));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_misspelled_object_keyword_fails() {
        assert_eq!(
            syntax_message("CREATE IND idx ON t (a)"),
            "near \"IND\": syntax error"
        );
    }

    #[test]
    fn test_bad_names_reach_validator() {
        assert!(matches!(
            parse("CREATE TABLE 23 (id INTEGER)"),
            Err(Error::Name(NameError::NumericLiteral(_)))
        ));
        assert!(matches!(
            parse("CREATE TABLE 2.07.2023 (id INTEGER)"),
            Err(Error::Name(NameError::DateLiteral(_)))
        ));
        match parse("CREATE TABLE est!@#$%^&*() (id INTEGER)") {
            Err(Error::Name(NameError::IllegalCharacter { name, ch })) => {
                assert_eq!(name, "est!@#$%^&*");
                assert_eq!(ch, '!');
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_quoted_names_accepted() {
        let stmt = parse_create_table("CREATE TABLE '2.07.2023' (id INTEGER)").unwrap();
        assert_eq!(stmt.name.value, "2.07.2023");
        assert_eq!(stmt.name.quote, QuoteStyle::SingleQuote);

        let stmt = parse_create_table("CREATE TABLE '' (id INTEGER)").unwrap();
        assert_eq!(stmt.name.value, "");

        let stmt = parse_create_table("CREATE TABLE \"my table\" (\"first name\" TEXT)").unwrap();
        assert_eq!(stmt.name.value, "my table");
        assert_eq!(columns_of(&stmt)[0].name.value, "first name");

        let stmt = parse_create_table("CREATE TABLE пользователи (имя TEXT)").unwrap();
        assert_eq!(stmt.name.normalized(), "пользователи");
    }

    #[test]
    fn test_parse_create_table_as_select() {
        let stmt =
            parse_create_table("CREATE TABLE copy AS SELECT * FROM src WHERE id = 2 LIMIT 1")
                .unwrap();
        match stmt.definition {
            TableDefinition::AsSelect(select) => {
                assert!(select.is_star());
                assert_eq!(select.from.as_deref(), Some("src"));
                assert!(select.where_clause.is_some());
                assert!(select.limit.is_some());
            }
            _ => panic!("expected AS SELECT"),
        }
    }

    #[test]
    fn test_parse_foreign_keys() {
        let stmt = parse_create_table(
            "CREATE TABLE orders (id INTEGER, customer_id INTEGER REFERENCES customers(id) \
             ON DELETE CASCADE, FOREIGN KEY (id) REFERENCES other(oid))",
        )
        .unwrap();
        match &columns_of(&stmt)[1].constraints[0].kind {
            ColumnConstraintKind::ForeignKey(fk) => {
                assert_eq!(fk.table, "customers");
                assert_eq!(fk.on_delete, Some(ForeignKeyAction::Cascade));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_create_index() {
        let stmt = parse_create_index(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_email ON users (email DESC) WHERE email IS NOT NULL",
        )
        .unwrap();
        assert!(stmt.unique);
        assert!(stmt.if_not_exists);
        assert_eq!(stmt.name.value, "idx_email");
        assert_eq!(stmt.table, "users");
        assert_eq!(stmt.columns[0].order, Some(SortOrder::Desc));
        assert!(stmt.where_clause.is_some());
    }

    #[test]
    fn test_parse_insert() {
        let stmt = parse("INSERT OR IGNORE INTO t (a, b) VALUES (1, 'x'), (2, NULL)").unwrap();
        match stmt {
            Stmt::Insert(insert) => {
                assert_eq!(insert.or_action, Some(ConflictAction::Ignore));
                assert_eq!(insert.columns, Some(vec!["a".to_string(), "b".to_string()]));
                assert!(matches!(insert.source, InsertSource::Values(ref rows) if rows.len() == 2));
            }
            _ => panic!("expected INSERT"),
        }

        assert!(matches!(
            parse("INSERT INTO t DEFAULT VALUES").unwrap(),
            Stmt::Insert(InsertStmt {
                source: InsertSource::DefaultValues,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_pragma() {
        let stmt = parse("PRAGMA table_info(users)").unwrap();
        assert_eq!(
            stmt,
            Stmt::Pragma(PragmaStmt {
                name: "table_info".into(),
                value: Some(PragmaValue::Call(Expr::string("users"))),
            })
        );

        let stmt = parse("PRAGMA foreign_keys = ON").unwrap();
        assert!(matches!(
            stmt,
            Stmt::Pragma(PragmaStmt { value: Some(PragmaValue::Set(_)), .. })
        ));
    }

    #[test]
    fn test_parse_expr_precedence() {
        let stmt = parse("SELECT 1 + 2 * 3").unwrap();
        let Stmt::Select(select) = stmt else {
            panic!("expected SELECT")
        };
        match &select.columns[0] {
            ResultColumn::Expr { expr, text, .. } => {
                assert_eq!(text, "1 + 2 * 3");
                assert!(matches!(expr, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_negated_min_integer_stays_integer() {
        let stmt = parse("SELECT -9223372036854775808, 9223372036854775808, - 5").unwrap();
        let Stmt::Select(select) = stmt else {
            panic!("expected SELECT")
        };
        let exprs: Vec<&Expr> = select
            .columns
            .iter()
            .map(|c| match c {
                ResultColumn::Expr { expr, .. } => expr,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(exprs[0], &Expr::Literal(Literal::Integer(i64::MIN)));
        assert!(matches!(exprs[1], Expr::Literal(Literal::Float(_))));
        assert!(matches!(exprs[2], Expr::Unary { op: UnaryOp::Neg, .. }));

        let stmt = parse_create_table("CREATE TABLE t (a INTEGER DEFAULT -9223372036854775808)").unwrap();
        match &columns_of(&stmt)[0].constraints[0].kind {
            ColumnConstraintKind::Default(d) => {
                assert_eq!(*d.expr, Expr::Literal(Literal::Integer(i64::MIN)));
                assert_eq!(d.text, "-9223372036854775808");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_multiple_statements() {
        let stmts = parse_all(
            "CREATE TABLE a (x INTEGER); CREATE INDEX ia ON a (x);; INSERT INTO a VALUES (1);",
        )
        .unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(parse_all("  ").unwrap().is_empty());
    }

    #[test]
    fn test_trailing_garbage_fails() {
        assert_eq!(
            syntax_message("CREATE TABLE t (a INTEGER) junk"),
            "near \"junk\": syntax error"
        );
    }

    #[test]
    fn test_schema_prefix() {
        let stmt = parse_create_table("CREATE TABLE main.t (a)").unwrap();
        assert_eq!(stmt.name.value, "t");
        assert!(parse("CREATE TABLE other.t (a)").is_err());
    }
}
