//! Constraint validation
//!
//! Two passes guard the catalog and the row store:
//!
//! - [`check_structure`] runs once per table definition, before the catalog
//!   accepts it.
//! - [`RowValidator`] runs once per candidate row, in a fixed order:
//!   NOT NULL, then primary/unique keys, then CHECK, then foreign keys.
//!
//! Foreign keys are enforced only when the connection enables them. The
//! referenced table does not have to exist when the child is declared.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::{CatalogError, Error, Result};
use crate::executor::expr::{Evaluator, RowContext};
use crate::parser::ast::{Expr, FunctionArgs};
use crate::parser::ident::normalize;
use crate::schema::catalog::Catalog;
use crate::schema::{Table, DEFAULT_COLLATION};
use crate::storage::RowStore;
use crate::types::{RowId, Value};

// ============================================================================
// Errors
// ============================================================================

/// A table definition that cannot be registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralConstraintError {
    #[error("table \"{table}\" has more than one primary key")]
    MultiplePrimaryKey { table: String },

    #[error("duplicate column name: {column}")]
    DuplicateColumn { table: String, column: String },

    #[error("no such column: {column}")]
    UnknownColumn { table: String, column: String },

    #[error("number of columns in foreign key does not match the number of columns in the referenced table {ref_table}")]
    ForeignKeyArity { table: String, ref_table: String },

    #[error("too many columns on {table}")]
    TooManyColumns { table: String, count: usize, max: usize },
}

/// A row rejected by a declared constraint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("NOT NULL constraint failed: {table}.{column}")]
    NullViolation { table: String, column: String },

    #[error("UNIQUE constraint failed: {}", qualify(.table, .columns))]
    UniqueViolation { table: String, columns: Vec<String> },

    #[error("CHECK constraint failed: {constraint}")]
    CheckViolation { table: String, constraint: String },

    #[error("FOREIGN KEY constraint failed")]
    ForeignKeyViolation { table: String, ref_table: String },
}

fn qualify(table: &str, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("{}.{}", table, c))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Structural Checks
// ============================================================================

/// Validate a table definition before it is registered.
pub fn check_structure(
    table: &Table,
    max_columns: usize,
) -> std::result::Result<(), StructuralConstraintError> {
    if table.columns.len() > max_columns {
        return Err(StructuralConstraintError::TooManyColumns {
            table: table.name.clone(),
            count: table.columns.len(),
            max: max_columns,
        });
    }

    let mut seen = HashSet::new();
    for col in &table.columns {
        if !seen.insert(normalize(&col.name)) {
            return Err(StructuralConstraintError::DuplicateColumn {
                table: table.name.clone(),
                column: col.name.clone(),
            });
        }
    }

    let key_columns = table
        .primary_key
        .iter()
        .flat_map(|pk| pk.columns.iter())
        .chain(table.unique_keys.iter().flat_map(|k| k.columns.iter()))
        .chain(table.foreign_keys.iter().flat_map(|fk| fk.columns.iter()));
    for name in key_columns {
        require_column(table, name)?;
    }

    for fk in &table.foreign_keys {
        if let Some(ref_columns) = &fk.ref_columns {
            if ref_columns.len() != fk.columns.len() {
                return Err(StructuralConstraintError::ForeignKeyArity {
                    table: table.name.clone(),
                    ref_table: fk.ref_table.clone(),
                });
            }
        }
    }

    for check in &table.checks {
        let mut names = Vec::new();
        collect_column_refs(&check.expr, &mut names);
        for name in names {
            if !is_boolean_word(&name) {
                require_column(table, &name)?;
            }
        }
    }

    Ok(())
}

fn require_column(
    table: &Table,
    name: &str,
) -> std::result::Result<(), StructuralConstraintError> {
    match table.column_index(name) {
        Some(_) => Ok(()),
        None => Err(StructuralConstraintError::UnknownColumn {
            table: table.name.clone(),
            column: name.to_string(),
        }),
    }
}

/// `true` and `false` read as 1 and 0 when no column claims the name
pub(crate) fn is_boolean_word(name: &str) -> bool {
    name.eq_ignore_ascii_case("true") || name.eq_ignore_ascii_case("false")
}

/// Every column name referenced by an expression
fn collect_column_refs(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Column(c) => out.push(c.column.clone()),
        Expr::Unary { expr, .. }
        | Expr::IsNull { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::Collate { expr, .. }
        | Expr::Parens(expr) => collect_column_refs(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_column_refs(left, out);
            collect_column_refs(right, out);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_column_refs(expr, out);
            collect_column_refs(low, out);
            collect_column_refs(high, out);
        }
        Expr::In { expr, list, .. } => {
            collect_column_refs(expr, out);
            list.iter().for_each(|e| collect_column_refs(e, out));
        }
        Expr::Like {
            expr,
            pattern,
            escape,
            ..
        } => {
            collect_column_refs(expr, out);
            collect_column_refs(pattern, out);
            if let Some(escape) = escape {
                collect_column_refs(escape, out);
            }
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(operand) = operand {
                collect_column_refs(operand, out);
            }
            for clause in when_clauses {
                collect_column_refs(&clause.when, out);
                collect_column_refs(&clause.then, out);
            }
            if let Some(else_clause) = else_clause {
                collect_column_refs(else_clause, out);
            }
        }
        Expr::Function(call) => {
            if let FunctionArgs::Exprs(args) = &call.args {
                args.iter().for_each(|e| collect_column_refs(e, out));
            }
        }
    }
}

// ============================================================================
// Row Checks
// ============================================================================

/// A key the candidate row collides with
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueConflict {
    /// Key columns as declared
    pub columns: Vec<String>,
    /// Stored rows holding the same key
    pub rowids: Vec<RowId>,
}

/// One primary, unique or unique-index key, resolved against a table
struct KeySpec<'a> {
    names: Vec<String>,
    positions: Vec<usize>,
    collations: Vec<String>,
    partial: Option<&'a Expr>,
}

/// Checks candidate rows against a table's declared constraints
pub struct RowValidator<'a> {
    catalog: &'a Catalog,
    store: &'a dyn RowStore,
    evaluator: &'a dyn Evaluator,
    foreign_keys: bool,
}

impl<'a> RowValidator<'a> {
    pub fn new(
        catalog: &'a Catalog,
        store: &'a dyn RowStore,
        evaluator: &'a dyn Evaluator,
        foreign_keys: bool,
    ) -> Self {
        Self {
            catalog,
            store,
            evaluator,
            foreign_keys,
        }
    }

    /// Run every row check in order, stopping at the first failure.
    pub fn check_row(&self, table: &Table, row: &[Value]) -> Result<()> {
        self.check_not_null(table, row)?;
        if let Some(conflict) = self.unique_conflicts(table, row)?.into_iter().next() {
            return Err(IntegrityError::UniqueViolation {
                table: table.name.clone(),
                columns: conflict.columns,
            }
            .into());
        }
        self.check_checks(table, row)?;
        self.check_foreign_keys(table, row)
    }

    pub fn check_not_null(&self, table: &Table, row: &[Value]) -> Result<()> {
        for (col, value) in table.columns.iter().zip(row) {
            if col.not_null() && value.is_null() {
                return Err(IntegrityError::NullViolation {
                    table: table.name.clone(),
                    column: col.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Keys of `row` already held by stored rows, in key declaration order.
    ///
    /// A key containing NULL never collides.
    pub fn unique_conflicts(&self, table: &Table, row: &[Value]) -> Result<Vec<UniqueConflict>> {
        let mut conflicts = Vec::new();
        for key in self.unique_keys(table)? {
            if key.positions.iter().any(|&p| row[p].is_null()) {
                continue;
            }
            if let Some(partial) = key.partial {
                if !self.satisfies(table, partial, row)? {
                    continue;
                }
            }

            let mut predicate = |stored: &[Value]| -> Result<bool> {
                let same = key.positions.iter().zip(&key.collations).all(|(&p, coll)| {
                    collated_eq(&stored[p], &row[p], coll)
                });
                match (same, key.partial) {
                    (true, Some(partial)) => self.satisfies(table, partial, stored),
                    (same, _) => Ok(same),
                }
            };
            let hits = self.store.scan(&table.key(), &mut predicate)?;
            if !hits.is_empty() {
                conflicts.push(UniqueConflict {
                    columns: key.names,
                    rowids: hits.into_iter().map(|(rowid, _)| rowid).collect(),
                });
            }
        }
        Ok(conflicts)
    }

    /// CHECK constraints fail only on a false result; NULL passes.
    pub fn check_checks(&self, table: &Table, row: &[Value]) -> Result<()> {
        let ctx = RowContext::new(table, row);
        for check in &table.checks {
            let value = self.evaluator.evaluate(&check.expr, &ctx)?;
            if value.truthiness() == Some(false) {
                return Err(IntegrityError::CheckViolation {
                    table: table.name.clone(),
                    constraint: check.label().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Every non-NULL child key must match a parent row.
    pub fn check_foreign_keys(&self, table: &Table, row: &[Value]) -> Result<()> {
        if !self.foreign_keys {
            return Ok(());
        }

        for fk in &table.foreign_keys {
            let child_positions = table
                .column_indices(&fk.columns)
                .ok_or_else(|| Error::execution(format!("malformed foreign key on {}", table.name)))?;
            if child_positions.iter().any(|&p| row[p].is_null()) {
                continue;
            }

            let parent = self
                .catalog
                .lookup_table(&fk.ref_table)
                .ok_or_else(|| CatalogError::UnknownTable(fk.ref_table.clone()))?;
            let parent_columns = match &fk.ref_columns {
                Some(cols) => cols.clone(),
                None => parent
                    .primary_key
                    .as_ref()
                    .map(|pk| pk.columns.clone())
                    .unwrap_or_default(),
            };
            let parent_positions = parent
                .column_indices(&parent_columns)
                .filter(|p| p.len() == child_positions.len())
                .ok_or_else(|| {
                    Error::execution(format!(
                        "foreign key mismatch - \"{}\" referencing \"{}\"",
                        table.name, parent.name
                    ))
                })?;

            // A row may reference itself
            if parent.key() == table.key()
                && child_positions
                    .iter()
                    .zip(&parent_positions)
                    .all(|(&c, &p)| row[c] == row[p])
            {
                continue;
            }

            let mut predicate = |stored: &[Value]| -> Result<bool> {
                Ok(child_positions
                    .iter()
                    .zip(&parent_positions)
                    .all(|(&c, &p)| stored[p] == row[c]))
            };
            if self.store.scan(&parent.key(), &mut predicate)?.is_empty() {
                return Err(IntegrityError::ForeignKeyViolation {
                    table: table.name.clone(),
                    ref_table: parent.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The rowid alias first, then every unique index in creation order
    fn unique_keys<'t>(&'t self, table: &'t Table) -> Result<Vec<KeySpec<'t>>> {
        let mut keys = Vec::new();

        if let Some(alias) = table.rowid_alias() {
            keys.push(KeySpec {
                names: vec![table.columns[alias].name.clone()],
                positions: vec![alias],
                collations: vec![DEFAULT_COLLATION.to_string()],
                partial: None,
            });
        }

        for index in self.catalog.indexes_on(&table.name) {
            if !index.unique {
                continue;
            }
            let mut spec = KeySpec {
                names: Vec::with_capacity(index.columns.len()),
                positions: Vec::with_capacity(index.columns.len()),
                collations: Vec::with_capacity(index.columns.len()),
                partial: index.partial.as_ref(),
            };
            for col in &index.columns {
                let pos = table.column_index(&col.name).ok_or_else(|| {
                    Error::execution(format!("no such column: {}", col.name))
                })?;
                let collation = if col.collation.eq_ignore_ascii_case(DEFAULT_COLLATION) {
                    table.columns[pos].collation.clone()
                } else {
                    col.collation.clone()
                };
                spec.names.push(table.columns[pos].name.clone());
                spec.positions.push(pos);
                spec.collations.push(collation);
            }
            keys.push(spec);
        }

        Ok(keys)
    }

    fn satisfies(&self, table: &Table, expr: &Expr, row: &[Value]) -> Result<bool> {
        let value = self.evaluator.evaluate(expr, &RowContext::new(table, row))?;
        Ok(value.truthiness() == Some(true))
    }
}

/// Equality under a named collation
pub(crate) fn collated_eq(a: &Value, b: &Value, collation: &str) -> bool {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => {
            if collation.eq_ignore_ascii_case("NOCASE") {
                x.eq_ignore_ascii_case(y)
            } else if collation.eq_ignore_ascii_case("RTRIM") {
                x.trim_end_matches(' ') == y.trim_end_matches(' ')
            } else {
                x == y
            }
        }
        _ => a == b,
    }
}

// ============================================================================
// Tests
// ============================================================================
