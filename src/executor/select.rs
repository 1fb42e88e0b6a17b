//! Single-table SELECT
//!
//! Reads one table (or the `sqlite_master` listing) front to back, filters
//! with WHERE, applies LIMIT/OFFSET and projects the result columns. There is
//! no planner: every query is a full scan in rowid order.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::executor::expr::{Evaluator, RowContext};
use crate::parser::ast::{Expr, LimitClause, ResultColumn, SelectStmt};
use crate::parser::ident::normalize;
use crate::schema::catalog::CatalogError;
use crate::schema::{Affinity, Catalog, Table};
use crate::storage::{Row, RowStore};
use crate::types::Value;

/// Rows produced by a query, with their column headings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Resolved LIMIT / OFFSET
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Bounds {
    /// Evaluate a LIMIT clause; a negative limit means no limit.
    pub fn evaluate(clause: Option<&LimitClause>, evaluator: &dyn Evaluator) -> Result<Self> {
        let Some(clause) = clause else {
            return Ok(Bounds::default());
        };
        let ctx = RowContext::empty();
        let limit = integer_bound(evaluator, &clause.limit, &ctx, "LIMIT")?;
        let offset = match &clause.offset {
            Some(expr) => integer_bound(evaluator, expr, &ctx, "OFFSET")?,
            None => 0,
        };
        Ok(Bounds {
            limit: usize::try_from(limit).ok(),
            offset: usize::try_from(offset).unwrap_or(0),
        })
    }
}

fn integer_bound(
    evaluator: &dyn Evaluator,
    expr: &Expr,
    ctx: &RowContext<'_>,
    what: &str,
) -> Result<i64> {
    match evaluator.evaluate(expr, ctx)? {
        Value::Integer(n) => Ok(n),
        other => match Affinity::Integer.apply(other) {
            Value::Integer(n) => Ok(n),
            _ => Err(Error::execution(format!("datatype mismatch in {}", what))),
        },
    }
}

/// Execute a SELECT against the catalog and row store.
pub fn execute_select(
    catalog: &Catalog,
    store: &dyn RowStore,
    evaluator: &dyn Evaluator,
    stmt: &SelectStmt,
) -> Result<ResultSet> {
    let bounds = Bounds::evaluate(stmt.limit.as_ref(), evaluator)?;

    let Some(from) = &stmt.from else {
        return select_without_table(evaluator, stmt, bounds);
    };

    let (table, rows): (Arc<Table>, Vec<Row>) = if Catalog::is_master_name(from) {
        (Arc::new(Catalog::master_table()), catalog.master_rows())
    } else {
        let table = catalog
            .lookup_table(from)
            .ok_or_else(|| CatalogError::UnknownTable(from.clone()))?;
        let rows = store
            .scan(&table.key(), &mut |_| Ok(true))?
            .into_iter()
            .map(|(_, row)| row)
            .collect();
        (table, rows)
    };

    let columns = headings(&table, &stmt.columns)?;
    let mut out = Vec::new();
    let mut skipped = 0;
    for row in &rows {
        if bounds.limit.is_some_and(|limit| out.len() >= limit) {
            break;
        }
        let ctx = RowContext::new(&table, row);
        if let Some(filter) = &stmt.where_clause {
            if evaluator.evaluate(filter, &ctx)?.truthiness() != Some(true) {
                continue;
            }
        }
        if skipped < bounds.offset {
            skipped += 1;
            continue;
        }
        out.push(project(evaluator, &table, &stmt.columns, &ctx, row)?);
    }

    Ok(ResultSet { columns, rows: out })
}

/// `SELECT expr, ...` with no FROM: one row, or none when WHERE rejects it
fn select_without_table(
    evaluator: &dyn Evaluator,
    stmt: &SelectStmt,
    bounds: Bounds,
) -> Result<ResultSet> {
    let ctx = RowContext::empty();
    let mut columns = Vec::with_capacity(stmt.columns.len());
    for col in &stmt.columns {
        match col {
            ResultColumn::Expr { alias, text, .. } => {
                columns.push(alias.clone().unwrap_or_else(|| text.clone()))
            }
            ResultColumn::Star | ResultColumn::TableStar(_) => {
                return Err(Error::execution("no tables specified"))
            }
        }
    }

    let keep = match &stmt.where_clause {
        Some(filter) => evaluator.evaluate(filter, &ctx)?.truthiness() == Some(true),
        None => true,
    };
    let mut rows = Vec::new();
    if keep && bounds.offset == 0 && bounds.limit != Some(0) {
        let mut row = Vec::with_capacity(stmt.columns.len());
        for col in &stmt.columns {
            if let ResultColumn::Expr { expr, .. } = col {
                row.push(evaluator.evaluate(expr, &ctx)?);
            }
        }
        rows.push(row);
    }
    Ok(ResultSet { columns, rows })
}

fn check_table_star(table: &Table, name: &str) -> Result<()> {
    if normalize(name) == table.key() {
        Ok(())
    } else {
        Err(Error::execution(format!("no such table: {}", name)))
    }
}

/// Column headings: declared names for `*`, else the alias or source text
pub fn headings(table: &Table, columns: &[ResultColumn]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for col in columns {
        match col {
            ResultColumn::Star => out.extend(table.column_names()),
            ResultColumn::TableStar(name) => {
                check_table_star(table, name)?;
                out.extend(table.column_names());
            }
            ResultColumn::Expr { alias, text, .. } => {
                out.push(alias.clone().unwrap_or_else(|| text.clone()))
            }
        }
    }
    Ok(out)
}

fn project(
    evaluator: &dyn Evaluator,
    table: &Table,
    columns: &[ResultColumn],
    ctx: &RowContext<'_>,
    row: &[Value],
) -> Result<Row> {
    let mut out = Vec::with_capacity(row.len());
    for col in columns {
        match col {
            ResultColumn::Star => out.extend_from_slice(row),
            ResultColumn::TableStar(name) => {
                check_table_star(table, name)?;
                out.extend_from_slice(row);
            }
            ResultColumn::Expr { expr, .. } => out.push(evaluator.evaluate(expr, ctx)?),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::expr::DefaultEvaluator;
    use crate::parser::ast::Stmt;
    use crate::parser::{parse, parse_create_table};
    use crate::schema::build::build_table;
    use crate::storage::MemoryStore;

    fn setup() -> (Catalog, MemoryStore) {
        let mut catalog = Catalog::new();
        let mut store = MemoryStore::new();
        let table = build_table(
            &parse_create_table("CREATE TABLE pets (id INTEGER PRIMARY KEY, name TEXT, age INT)")
                .unwrap(),
        )
        .unwrap();
        catalog.create_table(&mut store, table).unwrap();
        for (id, name, age) in [(1, "rex", 3), (2, "tom", 7), (3, "kit", 1)] {
            store
                .insert_at(
                    "pets",
                    id,
                    vec![Value::Integer(id), Value::from(name), Value::Integer(age)],
                )
                .unwrap();
        }
        (catalog, store)
    }

    fn select(catalog: &Catalog, store: &MemoryStore, sql: &str) -> Result<ResultSet> {
        match parse(sql)? {
            Stmt::Select(stmt) => execute_select(catalog, store, &DefaultEvaluator, &stmt),
            other => panic!("not a select: {:?}", other),
        }
    }

    #[test]
    fn test_star_select() {
        let (catalog, store) = setup();
        let rs = select(&catalog, &store, "SELECT * FROM pets").unwrap();
        assert_eq!(rs.columns, vec!["id", "name", "age"]);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.rows[1][1], Value::from("tom"));
    }

    #[test]
    fn test_where_limit_offset() {
        let (catalog, store) = setup();
        let rs = select(&catalog, &store, "SELECT name FROM pets WHERE age > 2").unwrap();
        assert_eq!(rs.rows, vec![vec![Value::from("rex")], vec![Value::from("tom")]]);

        let rs = select(&catalog, &store, "SELECT id FROM pets LIMIT 1 OFFSET 1").unwrap();
        assert_eq!(rs.rows, vec![vec![Value::Integer(2)]]);

        let rs = select(&catalog, &store, "SELECT * FROM pets LIMIT 0").unwrap();
        assert!(rs.is_empty());
    }

    #[test]
    fn test_expressions_and_headings() {
        let (catalog, store) = setup();
        let rs = select(&catalog, &store, "SELECT age * 2 AS twice, upper(name) FROM pets WHERE id = 1")
            .unwrap();
        assert_eq!(rs.columns, vec!["twice", "upper(name)"]);
        assert_eq!(rs.rows, vec![vec![Value::Integer(6), Value::from("REX")]]);
    }

    #[test]
    fn test_no_from() {
        let (catalog, store) = setup();
        let rs = select(&catalog, &store, "SELECT 1 + 1").unwrap();
        assert_eq!(rs.rows, vec![vec![Value::Integer(2)]]);
        assert!(select(&catalog, &store, "SELECT *").is_err());
    }

    #[test]
    fn test_master_listing() {
        let (catalog, store) = setup();
        let rs = select(&catalog, &store, "SELECT name, type FROM sqlite_master").unwrap();
        assert_eq!(rs.rows, vec![vec![Value::from("pets"), Value::from("table")]]);
    }

    #[test]
    fn test_unknown_table_and_column() {
        let (catalog, store) = setup();
        assert!(matches!(
            select(&catalog, &store, "SELECT * FROM nope"),
            Err(Error::Catalog(CatalogError::UnknownTable(_)))
        ));
        assert!(select(&catalog, &store, "SELECT color FROM pets").is_err());
    }
}
