//! INSERT execution
//!
//! Each candidate row is completed with defaults, coerced by column
//! affinity, given a rowid and checked by the [`RowValidator`] before it
//! reaches the row store. Rows are applied one at a time: a failing row stops
//! the statement, and rows stored before it stay.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::executor::expr::{Evaluator, RowContext};
use crate::executor::select::execute_select;
use crate::parser::ast::{ConflictAction, Expr, InsertSource, InsertStmt};
use crate::schema::catalog::CatalogError;
use crate::schema::constraint::RowValidator;
use crate::schema::{Catalog, Table};
use crate::storage::{Row, RowStore, StoreError};
use crate::types::{RowId, Value};

/// Counts reported by an INSERT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOutcome {
    /// Rows stored
    pub inserted: usize,
    /// Rows dropped by OR IGNORE
    pub ignored: usize,
    /// Rows deleted by OR REPLACE
    pub replaced: usize,
    /// Rowid of the last row stored
    pub last_rowid: Option<RowId>,
}

/// Everything an INSERT touches
pub struct InsertContext<'a> {
    pub catalog: &'a mut Catalog,
    pub store: &'a mut dyn RowStore,
    pub evaluator: &'a dyn Evaluator,
    pub foreign_keys: bool,
}

/// A source row, evaluated only when its turn comes
enum PendingRow<'s> {
    Exprs(&'s [Expr]),
    Values(Vec<Value>),
}

// ============================================================================
// Execution
// ============================================================================

/// Execute an INSERT statement.
pub fn execute_insert(cx: &mut InsertContext<'_>, stmt: &InsertStmt) -> Result<InsertOutcome> {
    let mut outcome = InsertOutcome::default();
    insert_into(cx, stmt, &mut outcome)?;
    Ok(outcome)
}

/// Execute an INSERT statement, counting into `outcome` as rows are stored.
///
/// On error `outcome` still describes the rows stored before the failure.
pub fn insert_into(
    cx: &mut InsertContext<'_>,
    stmt: &InsertStmt,
    outcome: &mut InsertOutcome,
) -> Result<()> {
    if Catalog::is_master_name(&stmt.table) {
        return Err(Error::execution(format!(
            "table {} may not be modified",
            stmt.table
        )));
    }
    let table = cx
        .catalog
        .lookup_table(&stmt.table)
        .ok_or_else(|| CatalogError::UnknownTable(stmt.table.clone()))?;

    let targets = target_positions(&table, stmt.columns.as_deref())?;
    let action = stmt.or_action.unwrap_or_default();

    let pending: Vec<PendingRow<'_>> = match &stmt.source {
        InsertSource::Values(rows) => {
            for exprs in rows {
                check_width(&table, stmt.columns.is_some(), targets.len(), exprs.len())?;
            }
            rows.iter().map(|exprs| PendingRow::Exprs(exprs)).collect()
        }
        InsertSource::Select(select) => {
            let result = execute_select(cx.catalog, &*cx.store, cx.evaluator, select)?;
            check_width(&table, stmt.columns.is_some(), targets.len(), result.columns.len())?;
            result.rows.into_iter().map(PendingRow::Values).collect()
        }
        InsertSource::DefaultValues => vec![PendingRow::Values(Vec::new())],
    };

    for pending in pending {
        let values = match pending {
            PendingRow::Exprs(exprs) => {
                let ctx = RowContext::empty();
                exprs
                    .iter()
                    .map(|e| cx.evaluator.evaluate(e, &ctx))
                    .collect::<Result<Vec<_>>>()?
            }
            PendingRow::Values(values) => values,
        };
        let row = prepare_row(cx, &table, &targets, values)?;
        insert_row(cx, &table, row, action, outcome)?;
    }

    debug!(
        table = %table.name,
        inserted = outcome.inserted,
        ignored = outcome.ignored,
        replaced = outcome.replaced,
        "insert complete"
    );
    Ok(())
}

/// Column positions the supplied values land in
fn target_positions(table: &Table, columns: Option<&[String]>) -> Result<Vec<usize>> {
    match columns {
        None => Ok((0..table.columns.len()).collect()),
        Some(names) => names
            .iter()
            .map(|name| {
                table.column_index(name).ok_or_else(|| {
                    CatalogError::UnknownColumn {
                        table: table.name.clone(),
                        column: name.clone(),
                    }
                    .into()
                })
            })
            .collect(),
    }
}

fn check_width(table: &Table, explicit: bool, expected: usize, supplied: usize) -> Result<()> {
    if expected == supplied {
        return Ok(());
    }
    Err(Error::execution(if explicit {
        format!("{} values for {} columns", supplied, expected)
    } else {
        format!(
            "table {} has {} columns but {} values were supplied",
            table.name, expected, supplied
        )
    }))
}

// ============================================================================
// Row Preparation
// ============================================================================

/// Fill omitted columns with their defaults and apply column affinity.
fn prepare_row(
    cx: &InsertContext<'_>,
    table: &Table,
    targets: &[usize],
    values: Vec<Value>,
) -> Result<Row> {
    let mut slots: Vec<Option<Value>> = vec![None; table.columns.len()];
    for (&pos, value) in targets.iter().zip(values) {
        slots[pos] = Some(value);
    }

    let empty = RowContext::empty();
    let mut row = Vec::with_capacity(slots.len());
    for (col, slot) in table.columns.iter().zip(slots) {
        let value = match (slot, &col.default_value) {
            (Some(value), _) => value,
            (None, Some(default)) => cx.evaluator.evaluate(&default.expr, &empty)?,
            (None, None) => Value::Null,
        };
        row.push(col.affinity.apply(value));
    }
    Ok(row)
}

/// Rowid for a row of a table whose INTEGER PRIMARY KEY sits at `alias`
fn assign_rowid(cx: &InsertContext<'_>, table: &Table, row: &mut Row, alias: usize) -> Result<RowId> {
    let rowid = match &row[alias] {
        Value::Null => {
            let next = cx.store.next_rowid(&table.key())?;
            match cx.catalog.sequence(&table.name) {
                Some(seq) if table.is_autoincrement() => {
                    let after = seq.checked_add(1).ok_or(StoreError::RowIdExhausted)?;
                    next.max(after)
                }
                _ => next,
            }
        }
        Value::Integer(id) => *id,
        _ => return Err(Error::execution("datatype mismatch")),
    };
    row[alias] = Value::Integer(rowid);
    Ok(rowid)
}

// ============================================================================
// Validation and Storage
// ============================================================================

fn insert_row(
    cx: &mut InsertContext<'_>,
    table: &Table,
    mut row: Row,
    action: ConflictAction,
    outcome: &mut InsertOutcome,
) -> Result<()> {
    let alias = table.rowid_alias();
    let rowid = match alias {
        Some(alias) => Some(assign_rowid(cx, table, &mut row, alias)?),
        None => None,
    };

    let doomed = {
        let validator = RowValidator::new(cx.catalog, &*cx.store, cx.evaluator, cx.foreign_keys);
        match action {
            ConflictAction::Ignore => match validator.check_row(table, &row) {
                Ok(()) => Vec::new(),
                Err(err) if err.is_integrity() => {
                    trace!(table = %table.name, error = %err, "row ignored");
                    outcome.ignored += 1;
                    return Ok(());
                }
                Err(err) => return Err(err),
            },
            ConflictAction::Replace => {
                validator.check_not_null(table, &row)?;
                let conflicts = validator.unique_conflicts(table, &row)?;
                validator.check_checks(table, &row)?;
                validator.check_foreign_keys(table, &row)?;
                let mut doomed: Vec<RowId> =
                    conflicts.into_iter().flat_map(|c| c.rowids).collect();
                doomed.sort_unstable();
                doomed.dedup();
                doomed
            }
            ConflictAction::Abort | ConflictAction::Fail | ConflictAction::Rollback => {
                validator.check_row(table, &row)?;
                Vec::new()
            }
        }
    };

    let key = table.key();
    for old in doomed {
        if cx.store.delete(&key, old)? {
            outcome.replaced += 1;
        }
    }

    let rowid = match rowid {
        Some(rowid) => {
            cx.store.insert_at(&key, rowid, row)?;
            rowid
        }
        None => cx.store.insert(&key, row)?,
    };
    if table.is_autoincrement() {
        cx.catalog.bump_sequence(&table.name, rowid);
    }
    outcome.inserted += 1;
    outcome.last_rowid = Some(rowid);
    trace!(table = %table.name, rowid, "row stored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IntegrityError;
    use crate::executor::expr::DefaultEvaluator;
    use crate::parser::ast::Stmt;
    use crate::parser::{parse, parse_create_index, parse_create_table};
    use crate::schema::build::{build_index, build_table};
    use crate::storage::MemoryStore;

    struct Fixture {
        catalog: Catalog,
        store: MemoryStore,
        foreign_keys: bool,
    }

    impl Fixture {
        fn new(ddl: &[&str]) -> Self {
            let mut catalog = Catalog::new();
            let mut store = MemoryStore::new();
            for sql in ddl {
                if sql.contains("INDEX") {
                    catalog
                        .register_index(build_index(&parse_create_index(sql).unwrap()))
                        .unwrap();
                } else {
                    let table = build_table(&parse_create_table(sql).unwrap()).unwrap();
                    catalog.create_table(&mut store, table).unwrap();
                }
            }
            Fixture {
                catalog,
                store,
                foreign_keys: false,
            }
        }

        fn insert(&mut self, sql: &str) -> Result<InsertOutcome> {
            let stmt = match parse(sql)? {
                Stmt::Insert(stmt) => stmt,
                other => panic!("not an insert: {:?}", other),
            };
            let mut cx = InsertContext {
                catalog: &mut self.catalog,
                store: &mut self.store,
                evaluator: &DefaultEvaluator,
                foreign_keys: self.foreign_keys,
            };
            execute_insert(&mut cx, &stmt)
        }

        fn rows(&self, table: &str) -> Vec<Row> {
            self.store
                .scan(table, &mut |_| Ok(true))
                .unwrap()
                .into_iter()
                .map(|(_, row)| row)
                .collect()
        }
    }

    #[test]
    fn test_defaults_and_affinity() {
        let mut fx = Fixture::new(&[
            "CREATE TABLE items (id INTEGER PRIMARY KEY, qty INT DEFAULT 0, color TEXT DEFAULT 'light', price REAL)",
        ]);
        fx.insert("INSERT INTO items (price) VALUES ('2.5')").unwrap();
        fx.insert("INSERT INTO items (qty, color, price) VALUES ('7', 3, 1)").unwrap();

        assert_eq!(
            fx.rows("items"),
            vec![
                vec![Value::Integer(1), Value::Integer(0), Value::from("light"), Value::Real(2.5)],
                vec![Value::Integer(2), Value::Integer(7), Value::from("3"), Value::Real(1.0)],
            ]
        );
    }

    #[test]
    fn test_default_date_now() {
        let mut fx = Fixture::new(&["CREATE TABLE log (msg TEXT, day TEXT DEFAULT (DATE('now')))"]);
        fx.insert("INSERT INTO log (msg) VALUES ('hi')").unwrap();
        let rows = fx.rows("log");
        assert!(matches!(&rows[0][1], Value::Text(day) if day.len() == 10));
    }

    #[test]
    fn test_rowid_assignment() {
        let mut fx = Fixture::new(&["CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"]);
        fx.insert("INSERT INTO t VALUES (NULL, 'a'), (10, 'b'), (NULL, 'c')").unwrap();
        let ids: Vec<Value> = fx.rows("t").into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(1), Value::Integer(10), Value::Integer(11)]);

        assert!(matches!(
            fx.insert("INSERT INTO t VALUES ('x', 'd')"),
            Err(Error::Execution(msg)) if msg == "datatype mismatch"
        ));
    }

    #[test]
    fn test_autoincrement_never_reuses() {
        let mut fx = Fixture::new(&["CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)"]);
        fx.insert("INSERT INTO t (v) VALUES ('a'), ('b')").unwrap();
        fx.store.delete("t", 2).unwrap();
        fx.insert("INSERT INTO t (v) VALUES ('c')").unwrap();
        let ids: Vec<Value> = fx.rows("t").into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(1), Value::Integer(3)]);
        assert_eq!(fx.catalog.sequence("t"), Some(3));
    }

    #[test]
    fn test_violation_keeps_earlier_rows() {
        let mut fx = Fixture::new(&["CREATE TABLE t (a INT NOT NULL, b TEXT UNIQUE)"]);
        let err = fx
            .insert("INSERT INTO t VALUES (1, 'x'), (NULL, 'y')")
            .unwrap_err();
        assert_eq!(err.to_string(), "NOT NULL constraint failed: t.a");
        assert_eq!(fx.rows("t").len(), 1);

        let err = fx.insert("INSERT INTO t VALUES (2, 'x')").unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::UniqueViolation { .. })
        ));
        assert_eq!(fx.rows("t").len(), 1);
    }

    #[test]
    fn test_or_ignore_and_or_replace() {
        let mut fx = Fixture::new(&["CREATE TABLE t (k TEXT PRIMARY KEY, v INT CHECK (v > 0))"]);
        fx.insert("INSERT INTO t VALUES ('a', 1)").unwrap();

        let outcome = fx
            .insert("INSERT OR IGNORE INTO t VALUES ('a', 2), ('b', -1), ('c', 3)")
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.ignored, 2);
        assert_eq!(outcome.last_rowid, Some(2));

        let outcome = fx.insert("INSERT OR REPLACE INTO t VALUES ('a', 9)").unwrap();
        assert_eq!(outcome.replaced, 1);
        assert_eq!(
            fx.rows("t"),
            vec![
                vec![Value::from("c"), Value::Integer(3)],
                vec![Value::from("a"), Value::Integer(9)],
            ]
        );

        // CHECK failures are not resolved by REPLACE
        assert!(fx.insert("INSERT OR REPLACE INTO t VALUES ('a', 0)").is_err());
        assert_eq!(fx.rows("t").len(), 2);
    }

    #[test]
    fn test_unique_index_and_partial_index() {
        let mut fx = Fixture::new(&[
            "CREATE TABLE users (email TEXT, active INT)",
            "CREATE UNIQUE INDEX users_email ON users (email) WHERE active = 1",
        ]);
        fx.insert("INSERT INTO users VALUES ('a@x', 1), ('a@x', 0)").unwrap();
        assert!(fx.insert("INSERT INTO users VALUES ('a@x', 1)").is_err());
    }

    #[test]
    fn test_foreign_keys_opt_in() {
        let mut fx = Fixture::new(&[
            "CREATE TABLE parent (id INTEGER PRIMARY KEY)",
            "CREATE TABLE child (pid INT REFERENCES parent(id))",
        ]);
        fx.insert("INSERT INTO child VALUES (5)").unwrap();

        fx.foreign_keys = true;
        let err = fx.insert("INSERT INTO child VALUES (6)").unwrap_err();
        assert_eq!(err.to_string(), "FOREIGN KEY constraint failed");
        fx.insert("INSERT INTO parent VALUES (6)").unwrap();
        fx.insert("INSERT INTO child VALUES (6), (NULL)").unwrap();
    }

    #[test]
    fn test_column_list_errors() {
        let mut fx = Fixture::new(&["CREATE TABLE t (a INT, b INT)"]);
        assert_eq!(
            fx.insert("INSERT INTO t VALUES (1)").unwrap_err().to_string(),
            "table t has 2 columns but 1 values were supplied"
        );
        assert_eq!(
            fx.insert("INSERT INTO t (a) VALUES (1, 2)").unwrap_err().to_string(),
            "2 values for 1 columns"
        );
        assert_eq!(
            fx.insert("INSERT INTO t (c) VALUES (1)").unwrap_err().to_string(),
            "table t has no column named c"
        );
        assert!(fx.insert("INSERT INTO nope VALUES (1)").is_err());
        assert!(fx.insert("INSERT INTO sqlite_master VALUES (1)").is_err());
    }

    #[test]
    fn test_insert_select_and_default_values() {
        let mut fx = Fixture::new(&[
            "CREATE TABLE src (a INT, b TEXT)",
            "CREATE TABLE dst (a INT, b TEXT DEFAULT 'none')",
        ]);
        fx.insert("INSERT INTO src VALUES (1, 'x'), (2, 'y')").unwrap();
        fx.insert("INSERT INTO dst SELECT * FROM src WHERE a > 1").unwrap();
        fx.insert("INSERT INTO dst DEFAULT VALUES").unwrap();
        assert_eq!(
            fx.rows("dst"),
            vec![
                vec![Value::Integer(2), Value::from("y")],
                vec![Value::Null, Value::from("none")],
            ]
        );
    }
}
