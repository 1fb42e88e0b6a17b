//! CREATE TABLE / CREATE INDEX execution
//!
//! Builds schema objects from their statements and registers them with the
//! catalog. `CREATE TABLE ... AS SELECT` copies rows through the row store;
//! the star form over a real table goes through
//! [`Catalog::create_table_as_select`], anything else is materialized first
//! and then populated.

use tracing::debug;

use crate::error::Result;
use crate::executor::expr::{Evaluator, RowContext};
use crate::executor::select::{execute_select, Bounds};
use crate::parser::ast::{
    CreateIndexStmt, CreateTableStmt, Expr, ResultColumn, SelectStmt, TableDefinition,
};
use crate::schema::build::{build_index, build_table};
use crate::schema::catalog::CatalogError;
use crate::schema::constraint::{collated_eq, IntegrityError};
use crate::schema::{Catalog, Column, Index, ObjectType, Table, DEFAULT_COLLATION};
use crate::storage::RowStore;
use crate::types::Value;

/// Result of a CREATE statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object was created; `rows` counts rows copied by AS SELECT
    Created { rows: usize },
    /// IF NOT EXISTS found an object of the same kind
    AlreadyExists,
}

// ============================================================================
// CREATE TABLE
// ============================================================================

pub fn execute_create_table(
    catalog: &mut Catalog,
    store: &mut dyn RowStore,
    evaluator: &dyn Evaluator,
    stmt: &CreateTableStmt,
) -> Result<CreateOutcome> {
    let name = &stmt.name.value;
    if stmt.if_not_exists && catalog.object_type(name) == Some(ObjectType::Table) {
        debug!(table = %name, "table exists, skipped");
        return Ok(CreateOutcome::AlreadyExists);
    }

    let rows = match &stmt.definition {
        TableDefinition::Columns { .. } => {
            catalog.create_table(store, build_table(stmt)?)?;
            0
        }
        TableDefinition::AsSelect(select) => {
            create_as_select(catalog, store, evaluator, stmt, select)?
        }
    };
    Ok(CreateOutcome::Created { rows })
}

fn create_as_select(
    catalog: &mut Catalog,
    store: &mut dyn RowStore,
    evaluator: &dyn Evaluator,
    stmt: &CreateTableStmt,
    select: &SelectStmt,
) -> Result<usize> {
    let name = &stmt.name.value;

    if let Some(from) = select.from.as_deref() {
        if select.is_star() && !Catalog::is_master_name(from) {
            let source = catalog
                .lookup_table(from)
                .ok_or_else(|| CatalogError::UnknownTable(from.to_string()))?;
            let bounds = Bounds::evaluate(select.limit.as_ref(), evaluator)?;
            let filter = select.where_clause.as_deref();

            let mut skipped = 0;
            let mut predicate = |row: &[Value]| -> Result<bool> {
                if let Some(filter) = filter {
                    let ctx = RowContext::new(&source, row);
                    if evaluator.evaluate(filter, &ctx)?.truthiness() != Some(true) {
                        return Ok(false);
                    }
                }
                if skipped < bounds.offset {
                    skipped += 1;
                    return Ok(false);
                }
                Ok(true)
            };
            let rows = catalog.create_table_as_select(
                store,
                name,
                from,
                Some(stmt.sql.clone()),
                &mut predicate,
                bounds.limit,
            )?;
            debug!(table = %name, source = %from, rows, "created table from select");
            return Ok(rows);
        }
    }

    if let Some(kind) = catalog.object_type(name) {
        return Err(CatalogError::DuplicateName {
            kind,
            name: name.clone(),
        }
        .into());
    }
    let result = execute_select(catalog, &*store, evaluator, select)?;

    let mut table = Table::new(name.clone());
    table.columns = derived_columns(catalog, select, &result.columns);
    table.temporary = stmt.temporary;
    table.sql = Some(stmt.sql.clone());
    let rows = catalog.populate_table(store, table, result.rows)?;
    debug!(table = %name, rows, "created table from select");
    Ok(rows)
}

/// Result columns as table columns; plain column references keep their
/// declared type, computed columns get none
fn derived_columns(catalog: &Catalog, select: &SelectStmt, headings: &[String]) -> Vec<Column> {
    let source: Option<Table> = select.from.as_deref().and_then(|from| {
        if Catalog::is_master_name(from) {
            Some(Catalog::master_table())
        } else {
            catalog.lookup_table(from).map(|t| (*t).clone())
        }
    });

    let mut types = Vec::with_capacity(headings.len());
    for col in &select.columns {
        match col {
            ResultColumn::Star | ResultColumn::TableStar(_) => {
                if let Some(source) = &source {
                    types.extend(source.columns.iter().map(|c| c.type_name.clone()));
                }
            }
            ResultColumn::Expr { expr, .. } => {
                let declared = match expr {
                    Expr::Column(col) => source
                        .as_ref()
                        .and_then(|t| t.column(&col.column))
                        .map(|c| c.type_name.clone()),
                    _ => None,
                };
                types.push(declared.unwrap_or_default());
            }
        }
    }

    headings
        .iter()
        .zip(types.into_iter().chain(std::iter::repeat(String::new())))
        .map(|(name, type_name)| Column::typed(name.clone(), type_name))
        .collect()
}

// ============================================================================
// CREATE INDEX
// ============================================================================

pub fn execute_create_index(
    catalog: &mut Catalog,
    store: &dyn RowStore,
    evaluator: &dyn Evaluator,
    stmt: &CreateIndexStmt,
) -> Result<CreateOutcome> {
    if stmt.if_not_exists && catalog.object_type(&stmt.name.value) == Some(ObjectType::Index) {
        debug!(index = %stmt.name.value, "index exists, skipped");
        return Ok(CreateOutcome::AlreadyExists);
    }

    let index = build_index(stmt);
    if index.unique && !catalog.contains(&index.name) {
        if let Some(table) = catalog.lookup_table(&index.table) {
            check_existing_rows(store, evaluator, &table, &index)?;
        }
    }
    catalog.register_index(index)?;
    Ok(CreateOutcome::Created { rows: 0 })
}

/// A UNIQUE index cannot be created over rows that already collide
fn check_existing_rows(
    store: &dyn RowStore,
    evaluator: &dyn Evaluator,
    table: &Table,
    index: &Index,
) -> Result<()> {
    let names = index.column_names();
    let Some(positions) = table.column_indices(&names) else {
        // The catalog reports the missing column
        return Ok(());
    };
    let collations: Vec<String> = index
        .columns
        .iter()
        .zip(&positions)
        .map(|(col, &pos)| {
            if col.collation.eq_ignore_ascii_case(DEFAULT_COLLATION) {
                table.columns[pos].collation.clone()
            } else {
                col.collation.clone()
            }
        })
        .collect();

    let mut keys: Vec<Vec<Value>> = Vec::new();
    let mut keep = |row: &[Value]| -> Result<bool> {
        if positions.iter().any(|&p| row[p].is_null()) {
            return Ok(false);
        }
        match &index.partial {
            Some(filter) => Ok(evaluator
                .evaluate(filter, &RowContext::new(table, row))?
                .truthiness()
                == Some(true)),
            None => Ok(true),
        }
    };
    for (_, row) in store.scan(&table.key(), &mut keep)? {
        let key: Vec<Value> = positions.iter().map(|&p| row[p].clone()).collect();
        let duplicate = keys.iter().any(|seen| {
            seen.iter()
                .zip(&key)
                .zip(&collations)
                .all(|((a, b), coll)| collated_eq(a, b, coll))
        });
        if duplicate {
            return Err(IntegrityError::UniqueViolation {
                table: table.name.clone(),
                columns: positions
                    .iter()
                    .map(|&p| table.columns[p].name.clone())
                    .collect(),
            }
            .into());
        }
        keys.push(key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::executor::expr::DefaultEvaluator;
    use crate::parser::ast::Stmt;
    use crate::parser::parse;
    use crate::storage::MemoryStore;

    struct Fixture {
        catalog: Catalog,
        store: MemoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                catalog: Catalog::new(),
                store: MemoryStore::new(),
            }
        }

        fn run(&mut self, sql: &str) -> Result<CreateOutcome> {
            match parse(sql)? {
                Stmt::CreateTable(stmt) => {
                    execute_create_table(&mut self.catalog, &mut self.store, &DefaultEvaluator, &stmt)
                }
                Stmt::CreateIndex(stmt) => {
                    execute_create_index(&mut self.catalog, &self.store, &DefaultEvaluator, &stmt)
                }
                other => panic!("not a create statement: {:?}", other),
            }
        }

        fn fill(&mut self, table: &str, rows: Vec<Vec<Value>>) {
            for row in rows {
                self.store.insert(table, row).unwrap();
            }
        }

        fn rows(&self, table: &str) -> Vec<Vec<Value>> {
            self.store
                .scan(table, &mut |_| Ok(true))
                .unwrap()
                .into_iter()
                .map(|(_, row)| row)
                .collect()
        }
    }

    #[test]
    fn test_if_not_exists() {
        let mut fx = Fixture::new();
        assert_eq!(
            fx.run("CREATE TABLE t (a INT)").unwrap(),
            CreateOutcome::Created { rows: 0 }
        );
        assert_eq!(
            fx.run("CREATE TABLE IF NOT EXISTS t (b INT)").unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(fx.catalog.lookup_table("t").unwrap().columns[0].name, "a");
        assert!(fx.run("CREATE TABLE t (b INT)").is_err());

        fx.run("CREATE INDEX i ON t (a)").unwrap();
        assert_eq!(
            fx.run("CREATE INDEX IF NOT EXISTS i ON t (a)").unwrap(),
            CreateOutcome::AlreadyExists
        );
        // Same name, different kind
        assert!(fx.run("CREATE TABLE IF NOT EXISTS i (a INT)").is_err());
    }

    #[test]
    fn test_ctas_star_with_predicate_and_limit() {
        let mut fx = Fixture::new();
        fx.run("CREATE TABLE src (id INTEGER PRIMARY KEY, name TEXT NOT NULL)").unwrap();
        fx.fill(
            "src",
            vec![
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::Integer(2), Value::from("b")],
                vec![Value::Integer(3), Value::from("c")],
            ],
        );

        fx.run("CREATE TABLE one AS SELECT * FROM src WHERE name = 'b'").unwrap();
        assert_eq!(fx.rows("one"), vec![vec![Value::Integer(2), Value::from("b")]]);

        fx.run("CREATE TABLE none AS SELECT * FROM src LIMIT 0").unwrap();
        assert!(fx.rows("none").is_empty());
        let copy = fx.catalog.lookup_table("none").unwrap();
        assert_eq!(copy.column_names(), vec!["id", "name"]);
        assert_eq!(copy.columns[0].type_name, "INTEGER");
        assert!(copy.primary_key.is_none());
        assert!(!copy.columns[1].not_null());

        fx.run("CREATE TABLE tail AS SELECT * FROM src LIMIT 5 OFFSET 1").unwrap();
        assert_eq!(fx.rows("tail").len(), 2);
    }

    #[test]
    fn test_ctas_expressions() {
        let mut fx = Fixture::new();
        fx.run("CREATE TABLE src (a INT, b TEXT)").unwrap();
        fx.fill("src", vec![vec![Value::Integer(2), Value::from("x")]]);

        let outcome = fx
            .run("CREATE TABLE derived AS SELECT a, a * 10 AS big FROM src")
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created { rows: 1 });
        let table = fx.catalog.lookup_table("derived").unwrap();
        assert_eq!(table.column_names(), vec!["a", "big"]);
        assert_eq!(table.columns[0].type_name, "INT");
        assert_eq!(table.columns[1].type_name, "");
        assert_eq!(fx.rows("derived"), vec![vec![Value::Integer(2), Value::Integer(20)]]);
    }

    #[test]
    fn test_ctas_errors_leave_catalog_unchanged() {
        let mut fx = Fixture::new();
        fx.run("CREATE TABLE src (a INT)").unwrap();
        assert!(matches!(
            fx.run("CREATE TABLE x AS SELECT * FROM missing"),
            Err(Error::Catalog(CatalogError::UnknownTable(_)))
        ));
        assert!(matches!(
            fx.run("CREATE TABLE src AS SELECT * FROM src"),
            Err(Error::Catalog(CatalogError::DuplicateName { .. }))
        ));
        assert!(fx.catalog.lookup_table("x").is_none());
        assert_eq!(fx.catalog.schema_entries().len(), 1);
    }

    #[test]
    fn test_unique_index_over_duplicates() {
        let mut fx = Fixture::new();
        fx.run("CREATE TABLE t (a TEXT, b INT)").unwrap();
        fx.fill(
            "t",
            vec![
                vec![Value::from("x"), Value::Integer(1)],
                vec![Value::from("X"), Value::Integer(2)],
                vec![Value::Null, Value::Integer(3)],
                vec![Value::Null, Value::Integer(4)],
            ],
        );

        fx.run("CREATE UNIQUE INDEX ua ON t (a)").unwrap();
        let err = fx.run("CREATE UNIQUE INDEX ua_nocase ON t (a COLLATE NOCASE)").unwrap_err();
        assert_eq!(err.to_string(), "UNIQUE constraint failed: t.a");
        assert!(fx.catalog.lookup_index("ua_nocase").is_none());

        fx.run("CREATE UNIQUE INDEX ua_partial ON t (a COLLATE NOCASE) WHERE b > 1").unwrap();
    }
}
