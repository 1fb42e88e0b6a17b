//! Date/time functions: date(), time(), datetime() and the CURRENT_* values.
//!
//! Time values are `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` (a `T` separator is
//! accepted too), `HH:MM[:SS]`, the word `now`, or a unix timestamp when the
//! argument is numeric. Modifiers shift the value: `±N days|hours|minutes|
//! seconds|months|years` and `start of day|month|year`. A value or modifier
//! that cannot be read yields NULL, never an error.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::types::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_time_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Integer(secs) => chrono::DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        Value::Real(secs) => chrono::DateTime::from_timestamp(secs.trunc() as i64, 0)
            .map(|dt| dt.naive_utc()),
        Value::Text(text) => parse_time_string(text.trim()),
        Value::Null | Value::Blob(_) => None,
    }
}

fn parse_time_string(text: &str) -> Option<NaiveDateTime> {
    if text.eq_ignore_ascii_case("now") {
        return Some(Utc::now().naive_utc());
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return date.and_hms_opt(0, 0, 0);
    }
    // A bare time is taken on 2000-01-01
    for format in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return NaiveDate::from_ymd_opt(2000, 1, 1).map(|d| d.and_time(time));
        }
    }
    None
}

fn apply_modifier(dt: NaiveDateTime, modifier: &str) -> Option<NaiveDateTime> {
    let modifier = modifier.trim().to_ascii_lowercase();

    if let Some(unit) = modifier.strip_prefix("start of ") {
        let date = dt.date();
        let start = match unit.trim() {
            "day" => date,
            "month" => date.with_day(1)?,
            "year" => date.with_day(1)?.with_month(1)?,
            _ => return None,
        };
        return start.and_hms_opt(0, 0, 0);
    }

    let (amount, unit) = modifier.split_once(char::is_whitespace)?;
    let amount: f64 = amount.trim().parse().ok()?;
    let unit = unit.trim();
    let unit = unit.strip_suffix('s').unwrap_or(unit);

    match unit {
        "day" => dt.checked_add_signed(Duration::milliseconds((amount * 86_400_000.0) as i64)),
        "hour" => dt.checked_add_signed(Duration::milliseconds((amount * 3_600_000.0) as i64)),
        "minute" => dt.checked_add_signed(Duration::milliseconds((amount * 60_000.0) as i64)),
        "second" => dt.checked_add_signed(Duration::milliseconds((amount * 1000.0) as i64)),
        "month" => add_months(dt, amount as i64),
        "year" => add_months(dt, (amount as i64).checked_mul(12)?),
        _ => None,
    }
}

fn add_months(dt: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

/// Parse the time value and apply every modifier; None on any failure
fn resolve(args: &[Value]) -> Option<NaiveDateTime> {
    let (first, modifiers) = args.split_first()?;
    let mut dt = parse_time_value(first)?;
    for modifier in modifiers {
        if modifier.is_null() {
            return None;
        }
        dt = apply_modifier(dt, &modifier.to_text())?;
    }
    Some(dt)
}

fn render(args: &[Value], format: &str) -> Value {
    match resolve(args) {
        Some(dt) => Value::Text(dt.format(format).to_string()),
        None => Value::Null,
    }
}

/// date(time-value, modifier, ...)
pub fn func_date(args: &[Value]) -> Result<Value> {
    Ok(render(args, DATE_FORMAT))
}

/// time(time-value, modifier, ...)
pub fn func_time(args: &[Value]) -> Result<Value> {
    Ok(render(args, TIME_FORMAT))
}

/// datetime(time-value, modifier, ...)
pub fn func_datetime(args: &[Value]) -> Result<Value> {
    Ok(render(args, DATETIME_FORMAT))
}

fn no_args(name: &str, args: &[Value]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(Error::execution(format!("{}() takes no arguments", name)))
    }
}

pub fn func_current_date(args: &[Value]) -> Result<Value> {
    no_args("current_date", args)?;
    func_date(&[Value::from("now")])
}

pub fn func_current_time(args: &[Value]) -> Result<Value> {
    no_args("current_time", args)?;
    func_time(&[Value::from("now")])
}

pub fn func_current_timestamp(args: &[Value]) -> Result<Value> {
    no_args("current_timestamp", args)?;
    func_datetime(&[Value::from("now")])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(v: Value) -> String {
        match v {
            Value::Text(s) => s,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_date_now_shape() {
        let today = text(func_date(&[Value::from("now")]).unwrap());
        assert_eq!(today.len(), 10);
        assert_eq!(today, Utc::now().format(DATE_FORMAT).to_string());

        let ts = text(func_current_timestamp(&[]).unwrap());
        assert_eq!(ts.len(), 19);
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(
            text(func_datetime(&[Value::from("2023-07-02 10:30")]).unwrap()),
            "2023-07-02 10:30:00"
        );
        assert_eq!(
            text(func_date(&[Value::from("2023-07-02T23:59:59")]).unwrap()),
            "2023-07-02"
        );
        assert_eq!(
            text(func_time(&[Value::from("12:34:56")]).unwrap()),
            "12:34:56"
        );
        assert_eq!(
            text(func_datetime(&[Value::Integer(0)]).unwrap()),
            "1970-01-01 00:00:00"
        );
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(
            text(func_date(&[Value::from("2023-01-31"), Value::from("+1 month")]).unwrap()),
            "2023-02-28"
        );
        assert_eq!(
            text(func_date(&[Value::from("2023-07-02"), Value::from("-2 days")]).unwrap()),
            "2023-06-30"
        );
        assert_eq!(
            text(
                func_datetime(&[Value::from("2023-07-02 10:00:00"), Value::from("start of month")])
                    .unwrap()
            ),
            "2023-07-01 00:00:00"
        );
    }

    #[test]
    fn test_unreadable_values_are_null() {
        assert!(func_date(&[Value::from("yesterday-ish")]).unwrap().is_null());
        assert!(func_date(&[]).unwrap().is_null());
        assert!(func_date(&[Value::Null]).unwrap().is_null());
        assert!(func_date(&[Value::from("2023-07-02"), Value::from("+1 fortnight")])
            .unwrap()
            .is_null());
        assert!(func_current_date(&[Value::Integer(1)]).is_err());
    }
}
