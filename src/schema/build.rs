//! Schema objects from parsed statements
//!
//! Turns a `CREATE TABLE` column list into a [`Table`] and a `CREATE INDEX`
//! into an [`Index`]. Only the one-primary-key rule is enforced here, since a
//! [`Table`] cannot hold two; every other structural rule is left to
//! [`check_structure`](super::constraint::check_structure).

use crate::error::{Error, Result};
use crate::parser::ast::{
    ColumnConstraint, ColumnConstraintKind, ColumnDef, CreateIndexStmt, CreateTableStmt,
    IndexedColumn, SortOrder, TableConstraint, TableConstraintKind, TableDefinition,
};
use crate::schema::constraint::StructuralConstraintError;
use crate::schema::{
    type_affinity, CheckConstraint, Column, ColumnFlags, ForeignKey, Index, IndexColumn,
    IndexOrigin, PrimaryKey, Table, UniqueKey, DEFAULT_COLLATION,
};

/// Build a table from a `CREATE TABLE ... (columns)` statement.
pub fn build_table(stmt: &CreateTableStmt) -> Result<Table> {
    let (columns, constraints) = match &stmt.definition {
        TableDefinition::Columns {
            columns,
            constraints,
        } => (columns, constraints),
        TableDefinition::AsSelect(_) => {
            return Err(Error::execution(
                "CREATE TABLE ... AS SELECT has no column list",
            ))
        }
    };

    let mut table = Table {
        name: stmt.name.value.clone(),
        temporary: stmt.temporary,
        sql: Some(stmt.sql.clone()),
        ..Default::default()
    };

    for def in columns {
        let column = build_column(def, &mut table)?;
        table.columns.push(column);
    }

    for constraint in constraints {
        apply_table_constraint(&mut table, constraint)?;
    }

    Ok(table)
}

fn build_column(def: &ColumnDef, table: &mut Table) -> Result<Column> {
    let type_name = def
        .type_name
        .as_ref()
        .map(|t| t.text.clone())
        .unwrap_or_default();
    let mut column = Column {
        name: def.name.value.clone(),
        affinity: type_affinity(&type_name),
        type_name,
        ..Default::default()
    };

    for constraint in &def.constraints {
        apply_column_constraint(&mut column, constraint, table)?;
    }

    Ok(column)
}

fn apply_column_constraint(
    column: &mut Column,
    constraint: &ColumnConstraint,
    table: &mut Table,
) -> Result<()> {
    match &constraint.kind {
        ColumnConstraintKind::PrimaryKey {
            order,
            conflict,
            autoincrement,
        } => {
            set_primary_key(
                table,
                PrimaryKey {
                    columns: vec![column.name.clone()],
                    conflict: *conflict,
                    autoincrement: *autoincrement,
                    order: *order,
                },
            )?;
            column.flags |= ColumnFlags::PRIMARY_KEY;
            column.pk_order = Some(1);
            // Inert unless the column turns out to alias the rowid
            if *autoincrement {
                column.flags |= ColumnFlags::AUTOINCREMENT;
            }
        }
        ColumnConstraintKind::NotNull { conflict } => {
            column.flags |= ColumnFlags::NOT_NULL;
            column.not_null_conflict = *conflict;
        }
        ColumnConstraintKind::Null => {}
        ColumnConstraintKind::Unique { conflict } => {
            column.flags |= ColumnFlags::UNIQUE;
            table.unique_keys.push(UniqueKey {
                name: constraint.name.clone(),
                columns: vec![column.name.clone()],
                conflict: *conflict,
            });
        }
        ColumnConstraintKind::Check(body) => {
            table.checks.push(CheckConstraint {
                name: constraint.name.clone(),
                text: body.text.clone(),
                expr: (*body.expr).clone(),
            });
        }
        ColumnConstraintKind::Default(value) => {
            column.flags |= ColumnFlags::HAS_DEFAULT;
            column.default_value = Some(value.clone());
        }
        ColumnConstraintKind::Collate(name) => {
            column.collation = name.clone();
        }
        ColumnConstraintKind::ForeignKey(clause) => {
            table.foreign_keys.push(ForeignKey {
                columns: vec![column.name.clone()],
                ref_table: clause.table.clone(),
                ref_columns: clause.columns.clone(),
                on_delete: clause.on_delete,
                on_update: clause.on_update,
            });
        }
    }
    Ok(())
}

fn apply_table_constraint(table: &mut Table, constraint: &TableConstraint) -> Result<()> {
    match &constraint.kind {
        TableConstraintKind::PrimaryKey { columns, conflict } => {
            let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            let order = match columns.as_slice() {
                [single] => single.order,
                _ => None,
            };
            set_primary_key(
                table,
                PrimaryKey {
                    columns: names.clone(),
                    conflict: *conflict,
                    autoincrement: false,
                    order,
                },
            )?;
            // Missing columns are reported by the structural check
            for (pos, name) in names.iter().enumerate() {
                if let Some(idx) = table.column_index(name) {
                    let col = &mut table.columns[idx];
                    col.flags |= ColumnFlags::PRIMARY_KEY;
                    col.pk_order = Some(pos + 1);
                }
            }
        }
        TableConstraintKind::Unique { columns, conflict } => {
            table.unique_keys.push(UniqueKey {
                name: constraint.name.clone(),
                columns: columns.iter().map(|c| c.name.clone()).collect(),
                conflict: *conflict,
            });
        }
        TableConstraintKind::Check(body) => {
            table.checks.push(CheckConstraint {
                name: constraint.name.clone(),
                text: body.text.clone(),
                expr: (*body.expr).clone(),
            });
        }
        TableConstraintKind::ForeignKey { columns, clause } => {
            table.foreign_keys.push(ForeignKey {
                columns: columns.clone(),
                ref_table: clause.table.clone(),
                ref_columns: clause.columns.clone(),
                on_delete: clause.on_delete,
                on_update: clause.on_update,
            });
        }
    }
    Ok(())
}

fn set_primary_key(table: &mut Table, pk: PrimaryKey) -> Result<()> {
    if table.primary_key.is_some() {
        return Err(StructuralConstraintError::MultiplePrimaryKey {
            table: table.name.clone(),
        }
        .into());
    }
    table.primary_key = Some(pk);
    Ok(())
}

/// Build an index from a `CREATE INDEX` statement.
pub fn build_index(stmt: &CreateIndexStmt) -> Index {
    Index {
        name: stmt.name.value.clone(),
        table: stmt.table.clone(),
        columns: stmt.columns.iter().map(index_column).collect(),
        unique: stmt.unique,
        origin: IndexOrigin::CreateIndex,
        partial: stmt.where_clause.as_deref().cloned(),
        sql: Some(stmt.sql.clone()),
    }
}

fn index_column(col: &IndexedColumn) -> IndexColumn {
    IndexColumn {
        name: col.name.clone(),
        sort_order: col.order.unwrap_or(SortOrder::Asc),
        collation: col
            .collation
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLATION.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_create_index, parse_create_table};

    fn build(sql: &str) -> Result<Table> {
        build_table(&parse_create_table(sql).unwrap())
    }

    #[test]
    fn test_composite_primary_key_order() {
        let table = build(
            "CREATE TABLE students (first TEXT, last TEXT, age INTEGER, PRIMARY KEY (last, first))",
        )
        .unwrap();
        assert_eq!(table.columns[0].pk_order, Some(2));
        assert_eq!(table.columns[1].pk_order, Some(1));
        assert_eq!(table.columns[2].pk_order, None);
        assert!(table.rowid_alias().is_none());
    }

    #[test]
    fn test_two_primary_keys() {
        let err = build("CREATE TABLE d (id INTEGER PRIMARY KEY, another_id INTEGER PRIMARY KEY)")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Structure(StructuralConstraintError::MultiplePrimaryKey { .. })
        ));

        let err = build("CREATE TABLE d (id INTEGER PRIMARY KEY, x INT, PRIMARY KEY (x))")
            .unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }

    #[test]
    fn test_column_flags_and_defaults() {
        let table = build(
            "CREATE TABLE s (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             theme TEXT NOT NULL DEFAULT 'light', code TEXT UNIQUE COLLATE NOCASE)",
        )
        .unwrap();
        assert!(table.columns[0].flags.contains(ColumnFlags::AUTOINCREMENT));
        assert!(table.is_autoincrement());
        assert!(table.columns[1].not_null());
        assert_eq!(table.columns[1].default_text(), Some("'light'"));
        assert!(table.columns[2].flags.contains(ColumnFlags::UNIQUE));
        assert_eq!(table.columns[2].collation, "NOCASE");
        assert_eq!(table.unique_keys.len(), 1);
        assert_eq!(table.sql.as_deref().map(|s| s.starts_with("CREATE TABLE s")), Some(true));
    }

    #[test]
    fn test_autoincrement_on_text_key_is_inert() {
        let table = build("CREATE TABLE t (code TEXT PRIMARY KEY AUTOINCREMENT)").unwrap();
        assert!(!table.is_autoincrement());
    }

    #[test]
    fn test_foreign_keys() {
        let table = build(
            "CREATE TABLE books (book_id INTEGER PRIMARY KEY, author_id INTEGER REFERENCES authors, \
             publisher_id INTEGER, FOREIGN KEY (publisher_id) REFERENCES publishers (publisher_id))",
        )
        .unwrap();
        assert_eq!(table.foreign_keys.len(), 2);
        assert_eq!(table.foreign_keys[0].ref_columns, None);
        assert_eq!(
            table.foreign_keys[1].ref_columns,
            Some(vec!["publisher_id".to_string()])
        );
    }

    #[test]
    fn test_build_index() {
        let stmt = parse_create_index(
            "CREATE UNIQUE INDEX idx ON t (a COLLATE NOCASE DESC, b) WHERE a > 0",
        )
        .unwrap();
        let index = build_index(&stmt);
        assert!(index.unique);
        assert_eq!(index.origin, IndexOrigin::CreateIndex);
        assert_eq!(index.columns[0].collation, "NOCASE");
        assert_eq!(index.columns[0].sort_order, SortOrder::Desc);
        assert_eq!(index.columns[1].collation, DEFAULT_COLLATION);
        assert!(index.partial.is_some());
    }
}
