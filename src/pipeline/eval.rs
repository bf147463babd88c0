//! Expression evaluation, numeric coercion and date handling.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};
use tracing::warn;

use super::doc::{number_value, resolve_field};
use super::error::{PipelineError, PipelineResult};
use super::types::{Expr, NumericPolicy};

/// Layouts accepted for date strings without an explicit offset (read as UTC).
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Layouts accepted for date strings with a numeric offset such as `+0100`.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
];

impl Expr {
    /// Evaluate against one document.
    pub fn eval(&self, doc: &Value, policy: NumericPolicy) -> PipelineResult<Value> {
        match self {
            Expr::Field(path) => Ok(resolve_field(doc, path).cloned().unwrap_or(Value::Null)),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::ToDouble(inner) => to_double(&inner.eval(doc, policy)?, policy),
            Expr::ToDate(inner) => Ok(to_date(&inner.eval(doc, policy)?)),
            Expr::Year(inner) => Ok(as_date(&inner.eval(doc, policy)?)
                .map(|d| json!(d.year()))
                .unwrap_or(Value::Null)),
            Expr::Month(inner) => Ok(as_date(&inner.eval(doc, policy)?)
                .map(|d| json!(d.month()))
                .unwrap_or(Value::Null)),
            Expr::Multiply(operands) => {
                let mut product = 1.0;
                let mut saw_null = false;
                for operand in operands {
                    match operand.eval(doc, policy)? {
                        Value::Null => saw_null = true,
                        Value::Number(n) => product *= n.as_f64().unwrap_or(f64::NAN),
                        other => return Err(PipelineError::type_mismatch("multiply", &other)),
                    }
                }
                if saw_null {
                    Ok(Value::Null)
                } else {
                    if !product.is_finite() {
                        warn!(expr = %self, "product overflowed, treated as null");
                    }
                    Ok(number_value(product))
                }
            }
        }
    }
}

/// Convert a value to a double.
///
/// Numbers pass through, numeric text is parsed, booleans become 1/0 and
/// null stays null. Anything else follows `policy`.
pub fn to_double(value: &Value, policy: NumericPolicy) -> PipelineResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => Ok(n.as_f64().map(number_value).unwrap_or(Value::Null)),
        Value::Bool(b) => Ok(json!(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(number_value(f)),
            _ => reject_number(value, policy),
        },
        other => reject_number(other, policy),
    }
}

fn reject_number(value: &Value, policy: NumericPolicy) -> PipelineResult<Value> {
    match policy {
        NumericPolicy::Error => Err(PipelineError::invalid_number(value)),
        NumericPolicy::Null => Ok(Value::Null),
    }
}

/// Parse a value into a date, rendered as an RFC 3339 UTC string.
///
/// Unparseable values become null so that they group together.
pub fn to_date(value: &Value) -> Value {
    as_date(value)
        .map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .unwrap_or(Value::Null)
}

/// Interpret a value as a UTC timestamp.
///
/// Strings are parsed with [`parse_date`]; numbers are milliseconds since
/// the Unix epoch.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

/// Parse a date string in one of the supported layouts.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
