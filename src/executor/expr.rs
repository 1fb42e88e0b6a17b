//! Expression evaluation
//!
//! Evaluates DEFAULT and CHECK bodies, partial-index predicates and the
//! WHERE / result expressions of single-table selects. Logic is SQL
//! three-valued: comparisons with NULL yield NULL, and `AND` / `OR` only
//! collapse NULL when the other side decides the result.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::functions::datetime::{func_current_date, func_current_time, func_current_timestamp};
use crate::functions::get_scalar_function;
use crate::functions::scalar::{escape_char, glob_match, like_match};
use crate::parser::ast::{
    BinaryOp, ColumnRef, Expr, FunctionArgs, LikeOp, Literal, UnaryOp,
};
use crate::parser::ident::normalize;
use crate::schema::constraint::is_boolean_word;
use crate::schema::{type_affinity, Affinity, Table, DEFAULT_COLLATION};
use crate::types::Value;

// ============================================================================
// Row Context
// ============================================================================

/// The row an expression is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    table: Option<&'a Table>,
    values: &'a [Value],
}

impl<'a> RowContext<'a> {
    /// A row of `table`, values in column order
    pub fn new(table: &'a Table, values: &'a [Value]) -> Self {
        RowContext {
            table: Some(table),
            values,
        }
    }

    /// No row at all; any column reference fails
    pub fn empty() -> Self {
        RowContext {
            table: None,
            values: &[],
        }
    }

    pub fn table(&self) -> Option<&'a Table> {
        self.table
    }

    fn column_position(&self, col: &ColumnRef) -> Option<usize> {
        let table = self.table?;
        if let Some(qualifier) = &col.table {
            if normalize(qualifier) != table.key() {
                return None;
            }
        }
        table.column_index(&col.column)
    }

    /// Value of a column reference
    pub fn column_value(&self, col: &ColumnRef) -> Result<Value> {
        match self.column_position(col) {
            Some(pos) => Ok(self.values.get(pos).cloned().unwrap_or(Value::Null)),
            None if col.table.is_none() && is_boolean_word(&col.column) => Ok(Value::Integer(
                i64::from(col.column.eq_ignore_ascii_case("true")),
            )),
            None => Err(Error::execution(match &col.table {
                Some(t) => format!("no such column: {}.{}", t, col.column),
                None => format!("no such column: {}", col.column),
            })),
        }
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluates an expression against a row
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expr: &Expr, row: &RowContext<'_>) -> Result<Value>;
}

/// Built-in tree-walking evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl Evaluator for DefaultEvaluator {
    fn evaluate(&self, expr: &Expr, row: &RowContext<'_>) -> Result<Value> {
        eval_expr(expr, row)
    }
}

/// Evaluate an expression against a row.
pub fn eval_expr(expr: &Expr, ctx: &RowContext<'_>) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => eval_literal(lit),
        Expr::Column(col) => ctx.column_value(col),
        Expr::Parens(inner) | Expr::Collate { expr: inner, .. } => eval_expr(inner, ctx),
        Expr::Unary { op, expr } => eval_unary(*op, eval_expr(expr, ctx)?),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let collation = collation_of(expr, ctx);
            let value = eval_expr(expr, ctx)?;
            let low = eval_expr(low, ctx)?;
            let high = eval_expr(high, ctx)?;
            let ge = compare_op(&value, &low, &collation, |o| o != Ordering::Less);
            let le = compare_op(&value, &high, &collation, |o| o != Ordering::Greater);
            Ok(negate_if(and3(ge, le), *negated))
        }
        Expr::In {
            expr,
            list,
            negated,
        } => {
            let collation = collation_of(expr, ctx);
            let value = eval_expr(expr, ctx)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let item = eval_expr(item, ctx)?;
                match compare_op(&value, &item, &collation, |o| o == Ordering::Equal) {
                    Some(true) => return Ok(Value::from(!*negated)),
                    Some(false) => {}
                    None => saw_null = true,
                }
            }
            if saw_null {
                Ok(Value::Null)
            } else {
                Ok(Value::from(*negated))
            }
        }
        Expr::Like {
            expr,
            pattern,
            escape,
            op,
            negated,
        } => {
            let value = eval_expr(expr, ctx)?;
            let pattern = eval_expr(pattern, ctx)?;
            let escape = match escape {
                Some(e) => Some(eval_expr(e, ctx)?),
                None => None,
            };
            if value.is_null() || pattern.is_null() || escape.as_ref().is_some_and(Value::is_null) {
                return Ok(Value::Null);
            }
            let matched = match op {
                LikeOp::Like => {
                    let escape = escape.as_ref().map(escape_char).transpose()?;
                    like_match(&pattern.to_text(), &value.to_text(), escape)
                }
                LikeOp::Glob => glob_match(&pattern.to_text(), &value.to_text()),
            };
            Ok(Value::from(matched != *negated))
        }
        Expr::IsNull { expr, negated } => {
            let value = eval_expr(expr, ctx)?;
            Ok(Value::from(value.is_null() != *negated))
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let operand = match operand {
                Some(o) => Some(eval_expr(o, ctx)?),
                None => None,
            };
            for clause in when_clauses {
                let when = eval_expr(&clause.when, ctx)?;
                let hit = match &operand {
                    Some(base) => !base.is_null() && !when.is_null() && *base == when,
                    None => when.truthiness() == Some(true),
                };
                if hit {
                    return eval_expr(&clause.then, ctx);
                }
            }
            match else_clause {
                Some(e) => eval_expr(e, ctx),
                None => Ok(Value::Null),
            }
        }
        Expr::Cast { expr, type_name } => {
            let value = eval_expr(expr, ctx)?;
            Ok(cast(value, type_affinity(&type_name.name)))
        }
        Expr::Function(call) => {
            let args = match &call.args {
                FunctionArgs::Exprs(args) => args
                    .iter()
                    .map(|a| eval_expr(a, ctx))
                    .collect::<Result<Vec<_>>>()?,
                FunctionArgs::Star => {
                    return Err(Error::execution(format!(
                        "misuse of aggregate: {}(*)",
                        call.name
                    )))
                }
            };
            let func = get_scalar_function(&call.name)
                .ok_or_else(|| Error::execution(format!("no such function: {}", call.name)))?;
            func(&args)
        }
    }
}

fn eval_literal(lit: &Literal) -> Result<Value> {
    match lit {
        Literal::Null => Ok(Value::Null),
        Literal::Integer(i) => Ok(Value::Integer(*i)),
        Literal::Float(f) => Ok(Value::Real(*f)),
        Literal::String(s) => Ok(Value::Text(s.clone())),
        Literal::Blob(b) => Ok(Value::Blob(b.clone())),
        Literal::CurrentDate => func_current_date(&[]),
        Literal::CurrentTime => func_current_time(&[]),
        Literal::CurrentTimestamp => func_current_timestamp(&[]),
    }
}

// ============================================================================
// Operators
// ============================================================================

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(match op {
        UnaryOp::Pos => value,
        UnaryOp::Neg => match to_numeric(&value) {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .unwrap_or(Value::Real(-(i as f64))),
            other => Value::Real(-other.to_f64()),
        },
        UnaryOp::Not => match value.truthiness() {
            Some(b) => Value::from(!b),
            None => Value::Null,
        },
        UnaryOp::BitNot => Value::Integer(!to_numeric(&value).to_i64()),
    })
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &RowContext<'_>) -> Result<Value> {
    match op {
        BinaryOp::And => {
            let l = eval_expr(left, ctx)?.truthiness();
            if l == Some(false) {
                return Ok(Value::Integer(0));
            }
            let r = eval_expr(right, ctx)?.truthiness();
            Ok(bool3(and3(l, r)))
        }
        BinaryOp::Or => {
            let l = eval_expr(left, ctx)?.truthiness();
            if l == Some(true) {
                return Ok(Value::Integer(1));
            }
            let r = eval_expr(right, ctx)?.truthiness();
            Ok(bool3(or3(l, r)))
        }
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge
        | BinaryOp::Is
        | BinaryOp::IsNot => {
            let collation = collation_of(left, ctx);
            let collation = if collation.eq_ignore_ascii_case(DEFAULT_COLLATION) {
                collation_of(right, ctx)
            } else {
                collation
            };
            let (l, r) = comparison_operands(left, right, ctx)?;
            eval_comparison(op, &l, &r, &collation)
        }
        _ => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            eval_arithmetic(op, &l, &r)
        }
    }
}

fn eval_comparison(op: BinaryOp, l: &Value, r: &Value, collation: &str) -> Result<Value> {
    let result = match op {
        BinaryOp::Is | BinaryOp::IsNot => {
            let same = match (l.is_null(), r.is_null()) {
                (true, true) => true,
                (false, false) => collated_cmp(l, r, collation) == Ordering::Equal,
                _ => false,
            };
            Some(same == (op == BinaryOp::Is))
        }
        BinaryOp::Eq => compare_op(l, r, collation, |o| o == Ordering::Equal),
        BinaryOp::Ne => compare_op(l, r, collation, |o| o != Ordering::Equal),
        BinaryOp::Lt => compare_op(l, r, collation, |o| o == Ordering::Less),
        BinaryOp::Le => compare_op(l, r, collation, |o| o != Ordering::Greater),
        BinaryOp::Gt => compare_op(l, r, collation, |o| o == Ordering::Greater),
        BinaryOp::Ge => compare_op(l, r, collation, |o| o != Ordering::Less),
        _ => return Err(Error::execution("not a comparison operator")),
    };
    Ok(bool3(result))
}

fn eval_arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    if op == BinaryOp::Concat {
        return Ok(Value::Text(format!("{}{}", l.to_text(), r.to_text())));
    }

    let (l, r) = (to_numeric(l), to_numeric(r));
    match op {
        BinaryOp::BitAnd => return Ok(Value::Integer(l.to_i64() & r.to_i64())),
        BinaryOp::BitOr => return Ok(Value::Integer(l.to_i64() | r.to_i64())),
        BinaryOp::ShiftLeft => return Ok(shift(l.to_i64(), r.to_i64())),
        BinaryOp::ShiftRight => return Ok(shift(l.to_i64(), r.to_i64().saturating_neg())),
        _ => {}
    }

    if let (Value::Integer(a), Value::Integer(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Ok(Value::Null),
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Mod if b == 0 => return Ok(Value::Null),
            BinaryOp::Mod => Some(a.checked_rem(b).unwrap_or(0)),
            _ => return Err(Error::execution("not an arithmetic operator")),
        };
        if let Some(v) = exact {
            return Ok(Value::Integer(v));
        }
    }

    let (a, b) = (l.to_f64(), r.to_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Div => a / b,
        BinaryOp::Mod => {
            let (a, b) = (a as i64, b as i64);
            if b == 0 {
                return Ok(Value::Null);
            }
            return Ok(Value::Real(a.checked_rem(b).unwrap_or(0) as f64));
        }
        _ => return Err(Error::execution("not an arithmetic operator")),
    };
    Ok(if result.is_nan() {
        Value::Null
    } else {
        Value::Real(result)
    })
}

fn shift(value: i64, by: i64) -> Value {
    Value::Integer(match by {
        n if n >= 64 => 0,
        n if n >= 0 => value << n,
        n if n <= -64 => {
            if value < 0 {
                -1
            } else {
                0
            }
        }
        n => value >> (-n),
    })
}

// ============================================================================
// Helpers
// ============================================================================

/// Operands of a comparison, with column affinity applied to the other side
fn comparison_operands(left: &Expr, right: &Expr, ctx: &RowContext<'_>) -> Result<(Value, Value)> {
    let mut l = eval_expr(left, ctx)?;
    let mut r = eval_expr(right, ctx)?;
    match (column_affinity(left, ctx), column_affinity(right, ctx)) {
        (Some(a), None) if is_numeric_affinity(a) => r = a.apply(r),
        (None, Some(a)) if is_numeric_affinity(a) => l = a.apply(l),
        (Some(Affinity::Text), None) if r.is_numeric() => r = Value::Text(r.to_text()),
        (None, Some(Affinity::Text)) if l.is_numeric() => l = Value::Text(l.to_text()),
        _ => {}
    }
    Ok((l, r))
}

fn is_numeric_affinity(a: Affinity) -> bool {
    matches!(a, Affinity::Integer | Affinity::Real | Affinity::Numeric)
}

fn column_affinity(expr: &Expr, ctx: &RowContext<'_>) -> Option<Affinity> {
    match expr {
        Expr::Column(col) => {
            let pos = ctx.column_position(col)?;
            ctx.table.map(|t| t.columns[pos].affinity)
        }
        Expr::Parens(inner) | Expr::Collate { expr: inner, .. } => column_affinity(inner, ctx),
        _ => None,
    }
}

/// Explicit COLLATE, else the column's declared collation
fn collation_of(expr: &Expr, ctx: &RowContext<'_>) -> String {
    match expr {
        Expr::Collate { collation, .. } => collation.clone(),
        Expr::Parens(inner) => collation_of(inner, ctx),
        Expr::Column(col) => ctx
            .column_position(col)
            .and_then(|pos| ctx.table.map(|t| t.columns[pos].collation.clone()))
            .unwrap_or_else(|| DEFAULT_COLLATION.to_string()),
        _ => DEFAULT_COLLATION.to_string(),
    }
}

fn collated_cmp(l: &Value, r: &Value, collation: &str) -> Ordering {
    match (l, r) {
        (Value::Text(a), Value::Text(b)) if collation.eq_ignore_ascii_case("NOCASE") => a
            .to_ascii_lowercase()
            .cmp(&b.to_ascii_lowercase()),
        (Value::Text(a), Value::Text(b)) if collation.eq_ignore_ascii_case("RTRIM") => {
            a.trim_end_matches(' ').cmp(b.trim_end_matches(' '))
        }
        _ => l.compare(r),
    }
}

/// NULL when either side is NULL
fn compare_op(
    l: &Value,
    r: &Value,
    collation: &str,
    test: impl Fn(Ordering) -> bool,
) -> Option<bool> {
    if l.is_null() || r.is_null() {
        return None;
    }
    Some(test(collated_cmp(l, r, collation)))
}

fn and3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn negate_if(v: Option<bool>, negated: bool) -> Value {
    bool3(v.map(|b| b != negated))
}

fn bool3(v: Option<bool>) -> Value {
    match v {
        Some(b) => Value::from(b),
        None => Value::Null,
    }
}

/// Numeric view of a value: numeric-looking text converts, other text is 0
fn to_numeric(value: &Value) -> Value {
    match Affinity::Numeric.apply(value.clone()) {
        v @ (Value::Integer(_) | Value::Real(_)) => v,
        Value::Null => Value::Null,
        other => Value::Integer(other.to_i64()),
    }
}

/// CAST(value AS type) using the affinity of the target type
pub fn cast(value: Value, affinity: Affinity) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match affinity {
        Affinity::Integer => Value::Integer(value.to_i64()),
        Affinity::Real => Value::Real(value.to_f64()),
        Affinity::Text => Value::Text(value.to_text()),
        Affinity::Blob => match value {
            Value::Blob(b) => Value::Blob(b),
            other => Value::Blob(other.to_text().into_bytes()),
        },
        Affinity::Numeric => to_numeric(&value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_create_table, Parser};
    use crate::schema::build::build_table;

    fn expr(sql: &str) -> Expr {
        let mut parser = Parser::new(sql).unwrap();
        parser.parse_expr().unwrap()
    }

    fn eval(sql: &str) -> Value {
        eval_expr(&expr(sql), &RowContext::empty()).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));
        assert_eq!(eval("7 / 2"), Value::Integer(3));
        assert_eq!(eval("7.0 / 2"), Value::Real(3.5));
        assert!(eval("1 / 0").is_null());
        assert_eq!(eval("7 % 3"), Value::Integer(1));
        assert_eq!(eval("'3' + 4"), Value::Integer(7));
        assert_eq!(eval("9223372036854775807 + 1"), Value::Real(9.223372036854776e18));
        assert_eq!(eval("'a' || 1 || 2.5"), Value::from("a12.5"));
        assert_eq!(eval("1 << 4"), Value::Integer(16));
        assert_eq!(eval("-(-3)"), Value::Integer(3));
        assert_eq!(eval("-9223372036854775808"), Value::Integer(i64::MIN));
        assert_eq!(eval("typeof(-9223372036854775808)"), Value::from("integer"));
        assert_eq!(eval("typeof(-(9223372036854775808))"), Value::from("real"));
    }

    #[test]
    fn test_three_valued_logic() {
        assert!(eval("NULL = 1").is_null());
        assert_eq!(eval("NULL AND 0"), Value::Integer(0));
        assert!(eval("NULL AND 1").is_null());
        assert_eq!(eval("NULL OR 1"), Value::Integer(1));
        assert!(eval("NOT NULL").is_null());
        assert_eq!(eval("NULL IS NULL"), Value::Integer(1));
        assert_eq!(eval("1 IS NOT NULL"), Value::Integer(1));
        assert!(eval("2 IN (1, NULL)").is_null());
        assert_eq!(eval("1 IN (1, NULL)"), Value::Integer(1));
        assert_eq!(eval("3 NOT IN (1, 2)"), Value::Integer(1));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(eval("5 BETWEEN 1 AND 10"), Value::Integer(1));
        assert_eq!(eval("5 NOT BETWEEN 1 AND 10"), Value::Integer(0));
        assert_eq!(eval("'Hello' LIKE 'h%'"), Value::Integer(1));
        assert_eq!(eval("'Hello' GLOB 'h*'"), Value::Integer(0));
        assert_eq!(eval("'abc' = 'ABC' COLLATE NOCASE"), Value::Integer(1));
        assert_eq!(
            eval("CASE WHEN 1 > 2 THEN 'a' WHEN 2 > 1 THEN 'b' END"),
            Value::from("b")
        );
        assert_eq!(eval("CASE 3 WHEN 1 THEN 'x' ELSE 'y' END"), Value::from("y"));
    }

    #[test]
    fn test_cast_and_functions() {
        assert_eq!(eval("CAST('12' AS INTEGER)"), Value::Integer(12));
        assert_eq!(eval("CAST(3 AS TEXT)"), Value::from("3"));
        assert_eq!(eval("CAST('2.5' AS REAL)"), Value::Real(2.5));
        assert_eq!(eval("upper('abc')"), Value::from("ABC"));
        assert_eq!(eval("coalesce(NULL, 'x')"), Value::from("x"));
        assert!(matches!(eval("date('now')"), Value::Text(s) if s.len() == 10));
        assert!(matches!(eval("CURRENT_TIMESTAMP"), Value::Text(s) if s.len() == 19));
        assert!(eval_expr(&expr("nope(1)"), &RowContext::empty()).is_err());
    }

    #[test]
    fn test_columns() {
        let table = build_table(
            &parse_create_table("CREATE TABLE t (id INTEGER, name TEXT COLLATE NOCASE)").unwrap(),
        )
        .unwrap();
        let row = [Value::Integer(7), Value::from("Ann")];
        let ctx = RowContext::new(&table, &row);

        assert_eq!(eval_expr(&expr("id * 2"), &ctx).unwrap(), Value::Integer(14));
        assert_eq!(eval_expr(&expr("t.name"), &ctx).unwrap(), Value::from("Ann"));
        assert_eq!(eval_expr(&expr("name = 'ANN'"), &ctx).unwrap(), Value::Integer(1));
        assert_eq!(eval_expr(&expr("id = '7'"), &ctx).unwrap(), Value::Integer(1));
        assert_eq!(eval_expr(&expr("true"), &ctx).unwrap(), Value::Integer(1));
        assert!(eval_expr(&expr("missing"), &ctx).is_err());
        assert!(eval_expr(&expr("other.id"), &ctx).is_err());
        assert!(eval_expr(&expr("id"), &RowContext::empty()).is_err());
    }
}
