//! PRAGMA handling
//!
//! Schema introspection (`table_info`, `index_list`, `index_info`,
//! `foreign_key_list`) read the catalog; `foreign_keys` reads or switches
//! row-level foreign key enforcement in the connection config.

use tracing::debug;

use crate::api::EngineConfig;
use crate::error::{Error, Result};
use crate::parser::ast::{Expr, ForeignKeyAction, Literal, PragmaStmt, PragmaValue, UnaryOp};
use crate::schema::Catalog;
use crate::storage::Row;
use crate::types::Value;

pub struct PragmaResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl PragmaResult {
    fn new(columns: &[&str], rows: Vec<Row>) -> Self {
        PragmaResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn empty() -> Self {
        PragmaResult {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// True when the pragma changes connection state
pub fn pragma_writes(pragma: &PragmaStmt) -> bool {
    matches!(pragma.value, Some(PragmaValue::Set(_)))
        && pragma.name.eq_ignore_ascii_case("foreign_keys")
}

pub fn execute_pragma(
    catalog: &Catalog,
    config: &mut EngineConfig,
    pragma: &PragmaStmt,
) -> Result<PragmaResult> {
    let name = pragma.name.to_lowercase();

    match name.as_str() {
        "table_info" => pragma_table_info(catalog, pragma),
        "index_list" => pragma_index_list(catalog, pragma),
        "index_info" => pragma_index_info(catalog, pragma),
        "foreign_key_list" => pragma_foreign_key_list(catalog, pragma),
        "foreign_keys" => pragma_foreign_keys(config, pragma),
        _ => Err(Error::execution(format!("unknown pragma: {}", pragma.name))),
    }
}

// Introspection pragmas on a missing object return no rows, as SQLite does.

fn pragma_table_info(catalog: &Catalog, pragma: &PragmaStmt) -> Result<PragmaResult> {
    let table_name = pragma_arg_string(pragma)?;
    let columns = ["cid", "name", "type", "notnull", "dflt_value", "pk"];
    if catalog.lookup_table(&table_name).is_none() {
        return Ok(PragmaResult::new(&columns, Vec::new()));
    }

    let rows = catalog
        .table_info(&table_name)?
        .into_iter()
        .map(|info| {
            vec![
                Value::Integer(info.cid as i64),
                Value::Text(info.name),
                Value::Text(info.type_name),
                Value::Integer(i64::from(info.not_null)),
                info.default_value.map(Value::Text).unwrap_or(Value::Null),
                Value::Integer(info.pk as i64),
            ]
        })
        .collect();
    Ok(PragmaResult::new(&columns, rows))
}

fn pragma_index_list(catalog: &Catalog, pragma: &PragmaStmt) -> Result<PragmaResult> {
    let table_name = pragma_arg_string(pragma)?;
    let rows = catalog
        .indexes_on(&table_name)
        .into_iter()
        .enumerate()
        .map(|(seq, index)| {
            vec![
                Value::Integer(seq as i64),
                Value::Text(index.name.clone()),
                Value::Integer(i64::from(index.unique)),
                Value::Text(index.origin.as_str().to_string()),
                Value::Integer(i64::from(index.partial.is_some())),
            ]
        })
        .collect();
    Ok(PragmaResult::new(
        &["seq", "name", "unique", "origin", "partial"],
        rows,
    ))
}

fn pragma_index_info(catalog: &Catalog, pragma: &PragmaStmt) -> Result<PragmaResult> {
    let index_name = pragma_arg_string(pragma)?;
    let columns = ["seqno", "cid", "name"];
    let Some(index) = catalog.lookup_index(&index_name) else {
        return Ok(PragmaResult::new(&columns, Vec::new()));
    };

    let table = catalog.lookup_table(&index.table);
    let rows = index
        .columns
        .iter()
        .enumerate()
        .map(|(seqno, col)| {
            let cid = table
                .as_ref()
                .and_then(|t| t.column_index(&col.name))
                .map(|idx| idx as i64)
                .unwrap_or(-1);
            vec![
                Value::Integer(seqno as i64),
                Value::Integer(cid),
                Value::Text(col.name.clone()),
            ]
        })
        .collect();
    Ok(PragmaResult::new(&columns, rows))
}

fn pragma_foreign_key_list(catalog: &Catalog, pragma: &PragmaStmt) -> Result<PragmaResult> {
    let table_name = pragma_arg_string(pragma)?;
    let columns = [
        "id",
        "seq",
        "table",
        "from",
        "to",
        "on_update",
        "on_delete",
        "match",
    ];
    let Some(table) = catalog.lookup_table(&table_name) else {
        return Ok(PragmaResult::new(&columns, Vec::new()));
    };

    let mut rows = Vec::new();
    for (id, fk) in table.foreign_keys.iter().enumerate() {
        for (seq, from) in fk.columns.iter().enumerate() {
            let to = fk
                .ref_columns
                .as_ref()
                .and_then(|cols| cols.get(seq))
                .map(|c| Value::Text(c.clone()))
                .unwrap_or(Value::Null);
            rows.push(vec![
                Value::Integer(id as i64),
                Value::Integer(seq as i64),
                Value::Text(fk.ref_table.clone()),
                Value::Text(from.clone()),
                to,
                Value::Text(fk_action_name(fk.on_update)),
                Value::Text(fk_action_name(fk.on_delete)),
                Value::Text("NONE".to_string()),
            ]);
        }
    }
    Ok(PragmaResult::new(&columns, rows))
}

fn pragma_foreign_keys(config: &mut EngineConfig, pragma: &PragmaStmt) -> Result<PragmaResult> {
    match &pragma.value {
        Some(PragmaValue::Set(expr)) | Some(PragmaValue::Call(expr)) => {
            let enabled = parse_switch(expr)
                .ok_or_else(|| Error::execution("invalid value for foreign_keys"))?;
            config.foreign_keys = enabled;
            debug!(enabled, "foreign key enforcement changed");
            Ok(PragmaResult::empty())
        }
        None => Ok(PragmaResult::new(
            &["foreign_keys"],
            vec![vec![Value::Integer(i64::from(config.foreign_keys))]],
        )),
    }
}

fn pragma_arg_string(pragma: &PragmaStmt) -> Result<String> {
    let expr = match pragma.value.as_ref() {
        Some(PragmaValue::Set(expr)) => expr,
        Some(PragmaValue::Call(expr)) => expr,
        None => return Err(Error::execution("missing pragma argument")),
    };
    expr_to_string(expr).ok_or_else(|| Error::execution("invalid pragma argument"))
}

/// `ON`/`OFF`, `TRUE`/`FALSE`, `YES`/`NO` or a number
fn parse_switch(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Literal(Literal::Integer(v)) => Some(*v != 0),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => parse_switch(expr),
        _ => match expr_to_string(expr)?.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" => Some(true),
            "off" | "false" | "no" => Some(false),
            other => other.parse::<i64>().ok().map(|v| v != 0),
        },
    }
}

fn expr_to_string(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Literal(Literal::String(v)) => Some(v.clone()),
        Expr::Literal(Literal::Integer(v)) => Some(v.to_string()),
        Expr::Literal(Literal::Float(v)) => Some(v.to_string()),
        Expr::Column(col) => Some(col.column.clone()),
        _ => None,
    }
}

fn fk_action_name(action: Option<ForeignKeyAction>) -> String {
    action
        .map(|a| a.as_str())
        .unwrap_or("NO ACTION")
        .to_string()
}
