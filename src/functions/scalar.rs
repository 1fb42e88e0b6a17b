//! Scalar SQL functions
//!
//! The built-ins DEFAULT and CHECK bodies reach for: arithmetic helpers,
//! string helpers, NULL handling and the date/time family. Each function
//! takes its evaluated arguments and returns a single value.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::types::Value;

use super::datetime::{
    func_current_date, func_current_time, func_current_timestamp, func_date, func_datetime,
    func_time,
};

// ============================================================================
// Function Registry
// ============================================================================

/// Function implementation type
pub type ScalarFunc = fn(&[Value]) -> Result<Value>;

/// Get a built-in scalar function by name
pub fn get_scalar_function(name: &str) -> Option<ScalarFunc> {
    match name.to_uppercase().as_str() {
        // Math functions
        "ABS" => Some(func_abs),
        "MAX" => Some(func_max),
        "MIN" => Some(func_min),
        "ROUND" => Some(func_round),

        // String functions
        "LENGTH" => Some(func_length),
        "SUBSTR" | "SUBSTRING" => Some(func_substr),
        "INSTR" => Some(func_instr),
        "UPPER" => Some(func_upper),
        "LOWER" => Some(func_lower),
        "TRIM" => Some(func_trim),
        "REPLACE" => Some(func_replace),
        "HEX" => Some(func_hex),
        "QUOTE" => Some(func_quote),

        // Type functions
        "TYPEOF" => Some(func_typeof),
        "COALESCE" => Some(func_coalesce),
        "NULLIF" => Some(func_nullif),
        "IFNULL" => Some(func_ifnull),
        "IIF" => Some(func_iif),

        // Pattern functions
        "LIKE" => Some(func_like),
        "GLOB" => Some(func_glob),

        // Date/time functions
        "DATE" => Some(func_date),
        "TIME" => Some(func_time),
        "DATETIME" => Some(func_datetime),
        "CURRENT_DATE" => Some(func_current_date),
        "CURRENT_TIME" => Some(func_current_time),
        "CURRENT_TIMESTAMP" => Some(func_current_timestamp),

        _ => None,
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(Error::execution(format!(
            "wrong number of arguments to function {}()",
            name
        )));
    }
    Ok(())
}

// ============================================================================
// Math Functions
// ============================================================================

/// abs(X) - Return the absolute value of X
pub fn func_abs(args: &[Value]) -> Result<Value> {
    expect_args("abs", args, 1, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Integer(n) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| Error::execution("integer overflow")),
        Value::Real(f) => Ok(Value::Real(f.abs())),
        Value::Text(s) => match s.trim().parse::<i64>() {
            Ok(n) => Ok(Value::Integer(n.saturating_abs())),
            Err(_) => Ok(Value::Real(args[0].to_f64().abs())),
        },
        Value::Blob(_) => Ok(Value::Real(0.0)),
    }
}

/// max(X, Y, ...) - NULL if any argument is NULL
pub fn func_max(args: &[Value]) -> Result<Value> {
    extreme(args, Ordering::Greater)
}

/// min(X, Y, ...) - NULL if any argument is NULL
pub fn func_min(args: &[Value]) -> Result<Value> {
    extreme(args, Ordering::Less)
}

fn extreme(args: &[Value], wanted: Ordering) -> Result<Value> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| Error::execution("wrong number of arguments to function"))?;
    let mut best = first;
    for arg in args {
        if arg.is_null() {
            return Ok(Value::Null);
        }
    }
    for arg in rest {
        if arg.compare(best) == wanted {
            best = arg;
        }
    }
    Ok(best.clone())
}

/// round(X) or round(X, Y) - Round X to Y decimal places
pub fn func_round(args: &[Value]) -> Result<Value> {
    expect_args("round", args, 1, 2)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let precision = args.get(1).map(|v| v.to_i64().clamp(0, 30)).unwrap_or(0) as i32;
    let multiplier = 10f64.powi(precision);
    Ok(Value::Real((args[0].to_f64() * multiplier).round() / multiplier))
}

// ============================================================================
// String Functions
// ============================================================================

/// length(X) - Characters in text, bytes in a blob
pub fn func_length(args: &[Value]) -> Result<Value> {
    expect_args("length", args, 1, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Blob(b) => Ok(Value::Integer(b.len() as i64)),
        other => Ok(Value::Integer(other.to_text().chars().count() as i64)),
    }
}

/// substr(X, Y) or substr(X, Y, Z) - 1-based; negative Y counts from the end
pub fn func_substr(args: &[Value]) -> Result<Value> {
    expect_args("substr", args, 2, 3)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }

    let chars: Vec<char> = args[0].to_text().chars().collect();
    let len = chars.len() as i64;
    let start = args[1].to_i64();
    let count = args.get(2).map(Value::to_i64);

    let mut from = if start > 0 {
        start - 1
    } else if start < 0 {
        len.saturating_add(start)
    } else {
        -1
    };
    let mut to = match count {
        Some(n) if n < 0 => {
            let end = from;
            from = from.saturating_add(n);
            end
        }
        Some(n) => from.saturating_add(n),
        None => len,
    };
    from = from.clamp(0, len);
    to = to.clamp(0, len);
    if to <= from {
        return Ok(Value::Text(String::new()));
    }
    Ok(Value::Text(chars[from as usize..to as usize].iter().collect()))
}

/// instr(X, Y) - 1-based position of Y in X, 0 when absent
pub fn func_instr(args: &[Value]) -> Result<Value> {
    expect_args("instr", args, 2, 2)?;
    if args[0].is_null() || args[1].is_null() {
        return Ok(Value::Null);
    }
    let haystack = args[0].to_text();
    let needle = args[1].to_text();
    Ok(Value::Integer(match haystack.find(&needle) {
        Some(pos) => haystack[..pos].chars().count() as i64 + 1,
        None => 0,
    }))
}

/// upper(X) - Convert to uppercase
pub fn func_upper(args: &[Value]) -> Result<Value> {
    expect_args("upper", args, 1, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => Ok(Value::Text(other.to_text().to_uppercase())),
    }
}

/// lower(X) - Convert to lowercase
pub fn func_lower(args: &[Value]) -> Result<Value> {
    expect_args("lower", args, 1, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => Ok(Value::Text(other.to_text().to_lowercase())),
    }
}

/// trim(X) or trim(X, Y) - Remove characters from both ends
pub fn func_trim(args: &[Value]) -> Result<Value> {
    expect_args("trim", args, 1, 2)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let s = args[0].to_text();
    let set: Vec<char> = match args.get(1) {
        Some(chars) => chars.to_text().chars().collect(),
        None => vec![' '],
    };
    Ok(Value::Text(s.trim_matches(|c| set.contains(&c)).to_string()))
}

/// replace(X, Y, Z) - Replace all occurrences of Y with Z in X
pub fn func_replace(args: &[Value]) -> Result<Value> {
    expect_args("replace", args, 3, 3)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let s = args[0].to_text();
    let from = args[1].to_text();
    if from.is_empty() {
        return Ok(Value::Text(s));
    }
    Ok(Value::Text(s.replace(&from, &args[2].to_text())))
}

/// hex(X) - Upper-case hex of the bytes of X
pub fn func_hex(args: &[Value]) -> Result<Value> {
    expect_args("hex", args, 1, 1)?;
    let encoded = match &args[0] {
        Value::Null => String::new(),
        Value::Blob(b) => hex::encode_upper(b),
        other => hex::encode_upper(other.to_text()),
    };
    Ok(Value::Text(encoded))
}

/// quote(X) - SQL literal text of X
pub fn func_quote(args: &[Value]) -> Result<Value> {
    expect_args("quote", args, 1, 1)?;
    Ok(Value::Text(args[0].to_sql_literal()))
}

// ============================================================================
// Type Functions
// ============================================================================

/// typeof(X) - Return the type of X as a string
pub fn func_typeof(args: &[Value]) -> Result<Value> {
    expect_args("typeof", args, 1, 1)?;
    Ok(Value::Text(args[0].type_name().to_string()))
}

/// coalesce(X, Y, ...) - Return first non-NULL argument
pub fn func_coalesce(args: &[Value]) -> Result<Value> {
    expect_args("coalesce", args, 2, usize::MAX)?;
    Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
}

/// nullif(X, Y) - Return NULL if X equals Y, otherwise return X
pub fn func_nullif(args: &[Value]) -> Result<Value> {
    expect_args("nullif", args, 2, 2)?;
    if !args[0].is_null() && args[0] == args[1] {
        Ok(Value::Null)
    } else {
        Ok(args[0].clone())
    }
}

/// ifnull(X, Y) - Return X if not NULL, otherwise return Y
pub fn func_ifnull(args: &[Value]) -> Result<Value> {
    expect_args("ifnull", args, 2, 2)?;
    if args[0].is_null() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

/// iif(X, Y, Z) - If X is true, return Y, else return Z
pub fn func_iif(args: &[Value]) -> Result<Value> {
    expect_args("iif", args, 3, 3)?;
    if args[0].truthiness() == Some(true) {
        Ok(args[1].clone())
    } else {
        Ok(args[2].clone())
    }
}

// ============================================================================
// Pattern Functions
// ============================================================================

/// like(PATTERN, X) or like(PATTERN, X, ESCAPE)
pub fn func_like(args: &[Value]) -> Result<Value> {
    expect_args("like", args, 2, 3)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let escape = match args.get(2) {
        Some(e) => Some(escape_char(e)?),
        None => None,
    };
    Ok(Value::from(like_match(
        &args[0].to_text(),
        &args[1].to_text(),
        escape,
    )))
}

/// glob(PATTERN, X) - Unix-style, case-sensitive
pub fn func_glob(args: &[Value]) -> Result<Value> {
    expect_args("glob", args, 2, 2)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    Ok(Value::from(glob_match(&args[0].to_text(), &args[1].to_text())))
}

/// The ESCAPE operand must be a single character
pub(crate) fn escape_char(value: &Value) -> Result<char> {
    let text = value.to_text();
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::execution(
            "ESCAPE expression must be a single character",
        )),
    }
}

/// LIKE matching; ASCII case-insensitive like SQLite's default
pub(crate) fn like_match(pattern: &str, text: &str, escape: Option<char>) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    like_match_impl(&pattern, &text, escape.map(|c| c.to_ascii_lowercase()))
}

fn like_match_impl(pattern: &[char], text: &[char], escape: Option<char>) -> bool {
    let mut p_idx = 0;
    let mut t_idx = 0;
    let mut star: Option<(usize, usize)> = None;

    while t_idx < text.len() {
        if p_idx < pattern.len() {
            let p_char = pattern[p_idx];
            if Some(p_char) == escape && p_idx + 1 < pattern.len() {
                if pattern[p_idx + 1] == text[t_idx] {
                    p_idx += 2;
                    t_idx += 1;
                    continue;
                }
            } else if p_char == '%' {
                star = Some((p_idx, t_idx));
                p_idx += 1;
                continue;
            } else if p_char == '_' || p_char == text[t_idx] {
                p_idx += 1;
                t_idx += 1;
                continue;
            }
        }

        // Mismatch: let the last % swallow one more character
        match star {
            Some((sp, st)) => {
                p_idx = sp + 1;
                t_idx = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    while p_idx < pattern.len() && pattern[p_idx] == '%' {
        p_idx += 1;
    }
    p_idx == pattern.len()
}

/// GLOB matching with `*`, `?` and `[...]` classes
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_impl(&pattern, &text)
}

fn glob_match_impl(pattern: &[char], text: &[char]) -> bool {
    let mut p_idx = 0;
    let mut t_idx = 0;
    let mut star: Option<(usize, usize)> = None;

    while t_idx < text.len() {
        if p_idx < pattern.len() {
            let p_char = pattern[p_idx];
            if p_char == '*' {
                star = Some((p_idx, t_idx));
                p_idx += 1;
                continue;
            } else if p_char == '[' {
                if let Some((true, width)) = match_char_class(&pattern[p_idx..], text[t_idx]) {
                    p_idx += width;
                    t_idx += 1;
                    continue;
                }
            } else if p_char == '?' || p_char == text[t_idx] {
                p_idx += 1;
                t_idx += 1;
                continue;
            }
        }

        match star {
            Some((sp, st)) => {
                p_idx = sp + 1;
                t_idx = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    while p_idx < pattern.len() && pattern[p_idx] == '*' {
        p_idx += 1;
    }
    p_idx == pattern.len()
}

/// Match `[abc]`, `[a-z]` or `[^...]`; returns (matched, pattern width)
fn match_char_class(pattern: &[char], c: char) -> Option<(bool, usize)> {
    let mut idx = 1;
    let negate = pattern.get(idx) == Some(&'^');
    if negate {
        idx += 1;
    }

    let mut matched = false;
    let mut first = true;
    while idx < pattern.len() && (pattern[idx] != ']' || first) {
        if idx + 2 < pattern.len() && pattern[idx + 1] == '-' && pattern[idx + 2] != ']' {
            if pattern[idx] <= c && c <= pattern[idx + 2] {
                matched = true;
            }
            idx += 3;
        } else {
            if pattern[idx] == c {
                matched = true;
            }
            idx += 1;
        }
        first = false;
    }

    if idx >= pattern.len() {
        return None;
    }
    Some((matched != negate, idx + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        get_scalar_function(name).unwrap()(args).unwrap()
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        assert!(get_scalar_function("date").is_some());
        assert!(get_scalar_function("DaTe").is_some());
        assert!(get_scalar_function("no_such_fn").is_none());
    }

    #[test]
    fn test_math() {
        assert_eq!(call("abs", &[Value::Integer(-4)]), Value::Integer(4));
        assert!(func_abs(&[Value::Integer(i64::MIN)]).is_err());
        assert_eq!(call("max", &[Value::Integer(1), Value::Real(2.5)]), Value::Real(2.5));
        assert!(call("min", &[Value::Integer(1), Value::Null]).is_null());
        assert_eq!(call("round", &[Value::Real(2.567), Value::Integer(2)]), Value::Real(2.57));
    }

    #[test]
    fn test_strings() {
        assert_eq!(call("length", &[Value::from("héllo")]), Value::Integer(5));
        assert_eq!(
            call("substr", &[Value::from("hello"), Value::Integer(2), Value::Integer(3)]),
            Value::from("ell")
        );
        assert_eq!(
            call("substr", &[Value::from("hello"), Value::Integer(-3)]),
            Value::from("llo")
        );
        assert_eq!(call("upper", &[Value::from("abc")]), Value::from("ABC"));
        assert_eq!(call("trim", &[Value::from("  x  ")]), Value::from("x"));
        assert_eq!(
            call("replace", &[Value::from("a-b-c"), Value::from("-"), Value::from("+")]),
            Value::from("a+b+c")
        );
        assert_eq!(call("instr", &[Value::from("hello"), Value::from("l")]), Value::Integer(3));
        assert_eq!(call("hex", &[Value::Blob(vec![0xAB, 0x01])]), Value::from("AB01"));
        assert_eq!(call("quote", &[Value::from("it's")]), Value::from("'it''s'"));
    }

    #[test]
    fn test_substr_extreme_bounds() {
        let substr = |start: i64, count: i64| {
            call("substr", &[Value::from("abc"), Value::Integer(start), Value::Integer(count)])
        };
        assert_eq!(substr(i64::MAX, i64::MAX), Value::from(""));
        assert_eq!(substr(-i64::MAX, -i64::MAX), Value::from(""));
        assert_eq!(substr(i64::MIN, 2), Value::from(""));
        assert_eq!(substr(2, i64::MAX), Value::from("bc"));
        assert_eq!(substr(-1, i64::MIN), Value::from("ab"));
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(call("coalesce", &[Value::Null, Value::Integer(2)]), Value::Integer(2));
        assert_eq!(call("ifnull", &[Value::Null, Value::from("x")]), Value::from("x"));
        assert!(call("nullif", &[Value::Integer(1), Value::Integer(1)]).is_null());
        assert_eq!(call("typeof", &[Value::Real(1.0)]), Value::from("real"));
        assert!(func_coalesce(&[Value::Null]).is_err());
    }

    #[test]
    fn test_like() {
        assert!(like_match("a%", "ABC", None));
        assert!(like_match("_b_", "abc", None));
        assert!(!like_match("a_", "abc", None));
        assert!(like_match("10!%", "10%", Some('!')));
        assert!(!like_match("10!%", "100", Some('!')));
    }

    #[test]
    fn test_glob() {
        assert!(glob_match("a*", "abc"));
        assert!(!glob_match("A*", "abc"));
        assert!(glob_match("[a-c]?", "bz"));
        assert!(glob_match("[^x]*", "abc"));
        assert!(!glob_match("[^a]*", "abc"));
    }
}
