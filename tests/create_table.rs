use schemaql::error::CatalogError;
use schemaql::schema::ObjectType;
use schemaql::{Connection, Error, Value};

type ColumnRow = (i64, String, String, i64, Option<String>, i64);

fn open() -> Connection {
    Connection::open_in_memory()
}

fn table_info(conn: &Connection, table: &str) -> Vec<ColumnRow> {
    let rows = conn
        .query(&format!("PRAGMA table_info({})", table))
        .unwrap_or_else(|e| panic!("table_info({}) failed: {}", table, e));
    rows.rows
        .into_iter()
        .map(|row| match row.as_slice() {
            [Value::Integer(cid), name, ty, Value::Integer(notnull), dflt, Value::Integer(pk)] => (
                *cid,
                name.to_text(),
                ty.to_text(),
                *notnull,
                (!dflt.is_null()).then(|| dflt.to_text()),
                *pk,
            ),
            other => panic!("unexpected table_info row: {:?}", other),
        })
        .collect()
}

fn col(cid: i64, name: &str, ty: &str, notnull: i64, dflt: Option<&str>, pk: i64) -> ColumnRow {
    (cid, name.into(), ty.into(), notnull, dflt.map(String::from), pk)
}

fn master_has(conn: &Connection, kind: &str, name: &str) -> bool {
    let sql = format!(
        "SELECT name FROM sqlite_master WHERE type='{}' AND name='{}'",
        kind,
        name.replace('\'', "''")
    );
    let rows = conn.query(&sql).unwrap();
    rows.rows == vec![vec![Value::from(name)]]
}

// ============================================================================
// Successful definitions
// ============================================================================

#[test]
fn test_primary_key_and_arbitrary_types() {
    let conn = open();
    conn.execute("CREATE TABLE cities (id INTEGER PRIMARY KEY, name VARCHAR(80), location POINT);")
        .unwrap();
    assert!(master_has(&conn, "table", "cities"));
    assert_eq!(
        table_info(&conn, "cities"),
        vec![
            col(0, "id", "INTEGER", 0, None, 1),
            col(1, "name", "VARCHAR(80)", 0, None, 0),
            col(2, "location", "POINT", 0, None, 0),
        ]
    );
}

#[test]
fn test_without_primary_key() {
    let conn = open();
    conn.execute("CREATE TABLE cities (id INTEGER, name VARCHAR(80), location POINT)")
        .unwrap();
    let info = table_info(&conn, "cities");
    assert_eq!(info.len(), 3);
    assert!(info.iter().all(|c| c.5 == 0));
}

#[test]
fn test_copy_structure_with_limit_zero() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE cities (id INTEGER PRIMARY KEY, name VARCHAR(80), location POINT);
         CREATE TABLE local_cities AS SELECT * FROM cities LIMIT 0;",
    )
    .unwrap();
    assert!(master_has(&conn, "table", "cities"));
    assert!(master_has(&conn, "table", "local_cities"));
    assert_eq!(
        table_info(&conn, "cities"),
        vec![
            col(0, "id", "INTEGER", 0, None, 1),
            col(1, "name", "VARCHAR(80)", 0, None, 0),
            col(2, "location", "POINT", 0, None, 0),
        ]
    );
    assert_eq!(table_info(&conn, "local_cities").len(), 3);
    assert!(conn.rows("local_cities").unwrap().is_empty());
}

#[test]
fn test_copy_with_data() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE cities (id INTEGER PRIMARY KEY, name VARCHAR(80));
         INSERT INTO cities (id, name) VALUES (1, 'Moscow'), (2, 'London'), (3, 'Milan');
         CREATE TABLE british_cities AS SELECT * FROM cities WHERE id = 2;",
    )
    .unwrap();
    assert!(master_has(&conn, "table", "british_cities"));
    let rows = conn.query("SELECT * FROM british_cities;").unwrap();
    assert_eq!(rows.rows, vec![vec![Value::Integer(2), Value::from("London")]]);
}

#[test]
fn test_copy_with_no_matches() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE cities (id INTEGER PRIMARY KEY, name VARCHAR(80));
         INSERT INTO cities VALUES (1, 'Moscow');
         CREATE TABLE nowhere AS SELECT * FROM cities WHERE id > 100;",
    )
    .unwrap();
    assert_eq!(table_info(&conn, "nowhere").len(), 2);
    assert!(conn.rows("nowhere").unwrap().is_empty());
}

#[test]
fn test_foreign_keys_and_not_null() {
    let conn = open();
    // The referenced table need not exist at declaration time
    conn.execute(
        "CREATE TABLE employees (
            id INTEGER PRIMARY KEY,
            name VARCHAR(80) NOT NULL,
            age INTEGER NOT NULL,
            city_id INTEGER NOT NULL,
            FOREIGN KEY(city_id) REFERENCES cities(id)
        );",
    )
    .unwrap();
    assert_eq!(
        table_info(&conn, "employees"),
        vec![
            col(0, "id", "INTEGER", 0, None, 1),
            col(1, "name", "VARCHAR(80)", 1, None, 0),
            col(2, "age", "INTEGER", 1, None, 0),
            col(3, "city_id", "INTEGER", 1, None, 0),
        ]
    );
}

#[test]
fn test_multiple_foreign_keys() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE authors (author_id INTEGER PRIMARY KEY);
         CREATE TABLE publishers (publisher_id INTEGER PRIMARY KEY);
         CREATE TABLE books (
            book_id INTEGER PRIMARY KEY,
            author_id INTEGER,
            publisher_id INTEGER,
            FOREIGN KEY(author_id) REFERENCES authors(author_id),
            FOREIGN KEY(publisher_id) REFERENCES publishers(publisher_id)
         );",
    )
    .unwrap();
    assert_eq!(table_info(&conn, "books").len(), 3);
    let fks = conn.query("PRAGMA foreign_key_list(books)").unwrap();
    assert_eq!(fks.len(), 2);
}

#[test]
fn test_unique_not_null() {
    let conn = open();
    conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(80) UNIQUE NOT NULL)")
        .unwrap();
    assert_eq!(
        table_info(&conn, "users"),
        vec![
            col(0, "id", "INTEGER", 0, None, 1),
            col(1, "name", "VARCHAR(80)", 1, None, 0),
        ]
    );
}

#[test]
fn test_accepted_names() {
    let conn = open();
    for (sql, name) in [
        ("CREATE TABLE пользователи (id INTEGER PRIMARY KEY)", "пользователи"),
        ("CREATE TABLE '2.07.2023' (id INTEGER PRIMARY KEY)", "2.07.2023"),
        ("CREATE TABLE '' (id INTEGER PRIMARY KEY)", ""),
        ("CREATE TABLE cities_23_$ (id INTEGER PRIMARY KEY)", "cities_23_$"),
        ("CREATE TABLE U (id INTEGER PRIMARY KEY, name VARCHAR(80) UNIQUE NOT NULL)", "U"),
    ] {
        conn.execute(sql).unwrap_or_else(|e| panic!("{}: {}", sql, e));
        assert!(master_has(&conn, "table", name), "{} not listed", name);
    }
    assert_eq!(table_info(&conn, "U").len(), 2);
}

#[test]
fn test_quoted_name_is_same_object() {
    let conn = open();
    conn.execute("CREATE TABLE 'пользователи' (id INTEGER PRIMARY KEY)")
        .unwrap();
    assert!(master_has(&conn, "table", "пользователи"));
    assert!(matches!(
        conn.execute("CREATE TABLE пользователи (id INTEGER)"),
        Err(Error::Catalog(_))
    ));
}

#[test]
fn test_check_and_autoincrement_columns() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE products (id INTEGER PRIMARY KEY, price REAL CHECK(price > 0));
         CREATE TABLE counters (id INTEGER PRIMARY KEY AUTOINCREMENT, price REAL);",
    )
    .unwrap();
    let expected = vec![
        col(0, "id", "INTEGER", 0, None, 1),
        col(1, "price", "REAL", 0, None, 0),
    ];
    assert_eq!(table_info(&conn, "products"), expected);
    assert_eq!(table_info(&conn, "counters"), expected);
}

#[test]
fn test_composite_primary_key() {
    let conn = open();
    conn.execute(
        "CREATE TABLE students (student_id INTEGER, course_id INTEGER, PRIMARY KEY (student_id, course_id))",
    )
    .unwrap();
    assert_eq!(
        table_info(&conn, "students"),
        vec![
            col(0, "student_id", "INTEGER", 0, None, 1),
            col(1, "course_id", "INTEGER", 0, None, 2),
        ]
    );
}

#[test]
fn test_default_text_is_verbatim() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE settings (id INTEGER PRIMARY KEY, theme TEXT DEFAULT 'light');
         CREATE TABLE prices (id INTEGER PRIMARY KEY, price REAL DEFAULT 0.0);
         CREATE TABLE dated (id INTEGER PRIMARY KEY, date DATE DEFAULT (DATE('now')));",
    )
    .unwrap();
    assert_eq!(table_info(&conn, "settings")[1], col(1, "theme", "TEXT", 0, Some("'light'"), 0));
    assert_eq!(table_info(&conn, "prices")[1], col(1, "price", "REAL", 0, Some("0.0"), 0));
    assert_eq!(table_info(&conn, "dated")[1], col(1, "date", "DATE", 0, Some("DATE('now')"), 0));
}

#[test]
fn test_create_index() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE indexed_table (id INTEGER PRIMARY KEY, column_to_index TEXT);
         CREATE INDEX idx_column_to_index ON indexed_table (column_to_index);",
    )
    .unwrap();
    assert!(master_has(&conn, "index", "idx_column_to_index"));
    let info = conn.query("PRAGMA index_info(idx_column_to_index)").unwrap();
    assert_eq!(
        info.rows,
        vec![vec![Value::Integer(0), Value::Integer(1), Value::from("column_to_index")]]
    );
}

// ============================================================================
// Rejected definitions
// ============================================================================

#[test]
fn test_syntax_errors() {
    let conn = open();
    for sql in [
        "CREATE TABLE employees (id INTEGER PRIMARY KEY name TEXT NOT NULL, age INTEGER)",
        "CREATE TABLE cities ()",
        "CREATE TABLE invalid_check_constraint (id INTEGER PRIMARY KEY, value REAL CHECK(value > ))",
    ] {
        assert!(
            matches!(conn.execute(sql), Err(Error::Syntax { .. })),
            "accepted: {}",
            sql
        );
    }
    assert!(conn.table_names().is_empty());

    conn.execute("CREATE TABLE valid_indexed_table (id INTEGER PRIMARY KEY, column_to_index TEXT)")
        .unwrap();
    assert!(conn
        .execute("CREATE IND invalid_syntax_index ON valid_indexed_table (column_to_index)")
        .is_err());
    assert!(conn.index_names(None).is_empty());
}

#[test]
fn test_invalid_unquoted_names() {
    let conn = open();
    for name in ["23", "2.07.2023", "est!@#$%^&*()", "my customer"] {
        let sql = format!("CREATE TABLE {} (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", name);
        assert!(conn.execute(&sql).is_err(), "accepted table name {}", name);
    }
    assert!(conn.table_names().is_empty());
}

#[test]
fn test_duplicate_names() {
    let conn = open();
    conn.execute_batch(
        "CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE INDEX emp_name ON employees (name);",
    )
    .unwrap();
    let columns = table_info(&conn, "employees");
    let entries = conn.schema_entries();

    let err = conn
        .execute("CREATE TABLE employees (id INTEGER PRIMARY KEY, department TEXT)")
        .unwrap_err();
    assert_eq!(err.to_string(), "table employees already exists");
    assert!(matches!(
        err,
        Error::Catalog(CatalogError::DuplicateName { kind: ObjectType::Table, ref name }) if name == "employees"
    ));
    assert!(matches!(
        conn.execute("CREATE TABLE emp_name (x)"),
        Err(Error::Catalog(CatalogError::DuplicateName { .. }))
    ));
    assert!(matches!(
        conn.execute("CREATE INDEX employees ON employees (name)"),
        Err(Error::Catalog(CatalogError::DuplicateName { .. }))
    ));

    // Original definition untouched
    assert_eq!(
        columns,
        vec![
            col(0, "id", "INTEGER", 0, None, 1),
            col(1, "name", "TEXT", 1, None, 0),
        ]
    );
    assert_eq!(table_info(&conn, "employees"), columns);
    assert_eq!(conn.schema_entries(), entries);
    assert!(conn.lookup_table("emp_name").is_none());
}

#[test]
fn test_structural_errors_register_nothing() {
    let conn = open();
    for sql in [
        "CREATE TABLE dup (id INTEGER PRIMARY KEY, name TEXT NOT NULL, name TEXT NOT NULL)",
        "CREATE TABLE duplicate_primary_key (id INTEGER PRIMARY KEY, another_id INTEGER PRIMARY KEY)",
        "CREATE TABLE pk_twice (a INTEGER PRIMARY KEY, b INTEGER, PRIMARY KEY (a, b))",
        "CREATE TABLE ghost (a INTEGER, PRIMARY KEY (missing))",
    ] {
        assert!(
            matches!(conn.execute(sql), Err(Error::Structure(_))),
            "accepted: {}",
            sql
        );
    }
    assert!(conn.schema_entries().is_empty());
}
