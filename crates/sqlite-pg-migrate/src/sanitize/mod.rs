//! Per-value sanitization driven by destination type class.
//!
//! SQLite stores whatever it is given, so a `DATETIME` column can hold epoch
//! integers, ISO strings or empty strings side by side. Each class has one
//! total transform that turns such values into something the target column
//! will accept, or NULL.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::classify::{ColumnClasses, DestinationTypeClass};
use crate::core::value::{Row, SqlValue};

/// Values at or above this are epoch milliseconds.
const EPOCH_MILLIS_MIN: i64 = 1_000_000_000_000;
/// Values in `[EPOCH_SECONDS_MIN, EPOCH_SECONDS_MAX)` that are not
/// milliseconds are epoch seconds.
const EPOCH_SECONDS_MIN: i64 = 1_000_000_000;
const EPOCH_SECONDS_MAX: i64 = 5_000_000_000_000;

/// Naive formats tried after RFC 3339, all read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Row sanitizer configured with the empty-string policy.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    /// Turn whitespace-only strings into NULL before class logic runs.
    pub empty_string_as_null: bool,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            empty_string_as_null: true,
        }
    }
}

impl Sanitizer {
    pub fn new(empty_string_as_null: bool) -> Self {
        Self {
            empty_string_as_null,
        }
    }

    /// Sanitize one value for a column of the given class.
    pub fn sanitize(&self, class: DestinationTypeClass, value: SqlValue) -> SqlValue {
        if class == DestinationTypeClass::Other {
            return value;
        }
        if self.empty_string_as_null && value.is_blank_text() {
            return SqlValue::Null;
        }

        match class {
            DestinationTypeClass::Date => sanitize_date(value),
            DestinationTypeClass::Boolean => sanitize_bool(value),
            DestinationTypeClass::Int => sanitize_int(value),
            DestinationTypeClass::Float => sanitize_float(value),
            DestinationTypeClass::Decimal => sanitize_decimal(value),
            DestinationTypeClass::Other => value,
        }
    }

    /// Sanitize a row whose values line up with `columns`.
    pub fn sanitize_row(&self, classes: &ColumnClasses, columns: &[String], row: Row) -> Row {
        row.into_iter()
            .enumerate()
            .map(|(i, value)| {
                let class = columns
                    .get(i)
                    .map(|c| classes.get(c))
                    .unwrap_or(DestinationTypeClass::Other);
                self.sanitize(class, value)
            })
            .collect()
    }
}

fn sanitize_date(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::DateTime(_) => value,
        SqlValue::I64(n) => epoch_from_i64(n),
        SqlValue::F64(f) => epoch_from_f64(f),
        SqlValue::Decimal(s) => s.trim().parse::<f64>().map_or(SqlValue::Null, epoch_from_f64),
        SqlValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                SqlValue::Null
            } else if s.bytes().all(|b| b.is_ascii_digit()) {
                match s.parse::<i64>() {
                    Ok(n) => epoch_from_i64(n),
                    Err(_) => SqlValue::Null,
                }
            } else {
                parse_datetime(s).map_or(SqlValue::Null, SqlValue::DateTime)
            }
        }
        SqlValue::Null | SqlValue::Bool(_) | SqlValue::Bytes(_) => SqlValue::Null,
    }
}

fn epoch_from_i64(n: i64) -> SqlValue {
    if n == 0 {
        return SqlValue::Null;
    }
    let millis = if n >= EPOCH_MILLIS_MIN {
        Some(n)
    } else if (EPOCH_SECONDS_MIN..EPOCH_SECONDS_MAX).contains(&n) {
        n.checked_mul(1000)
    } else {
        Some(n)
    };
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map_or(SqlValue::Null, SqlValue::DateTime)
}

fn epoch_from_f64(f: f64) -> SqlValue {
    if !f.is_finite() || f == 0.0 {
        return SqlValue::Null;
    }
    let millis = if f >= EPOCH_MILLIS_MIN as f64 {
        f
    } else if f >= EPOCH_SECONDS_MIN as f64 && f < EPOCH_SECONDS_MAX as f64 {
        f * 1000.0
    } else {
        f
    };
    f64_to_i64(millis.round())
        .and_then(DateTime::from_timestamp_millis)
        .map_or(SqlValue::Null, SqlValue::DateTime)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

fn sanitize_bool(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Bool(_) => value,
        SqlValue::I64(n) => SqlValue::Bool(n != 0),
        SqlValue::F64(f) if f.is_nan() => SqlValue::Null,
        SqlValue::F64(f) => SqlValue::Bool(f != 0.0),
        SqlValue::Text(s) | SqlValue::Decimal(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => SqlValue::Bool(true),
            "false" | "f" | "no" | "n" | "0" => SqlValue::Bool(false),
            _ => SqlValue::Null,
        },
        SqlValue::Null | SqlValue::Bytes(_) | SqlValue::DateTime(_) => SqlValue::Null,
    }
}

fn sanitize_int(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::I64(_) => value,
        SqlValue::Bool(b) => SqlValue::I64(i64::from(b)),
        SqlValue::F64(f) => f64_to_i64(f.trunc()).map_or(SqlValue::Null, SqlValue::I64),
        SqlValue::Text(s) | SqlValue::Decimal(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return SqlValue::I64(n);
            }
            parse_finite(s)
                .and_then(|f| f64_to_i64(f.trunc()))
                .map_or(SqlValue::Null, SqlValue::I64)
        }
        SqlValue::Null | SqlValue::Bytes(_) | SqlValue::DateTime(_) => SqlValue::Null,
    }
}

fn sanitize_float(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::F64(f) if f.is_finite() => value,
        SqlValue::F64(_) => SqlValue::Null,
        SqlValue::I64(n) => SqlValue::F64(n as f64),
        SqlValue::Bool(b) => SqlValue::F64(if b { 1.0 } else { 0.0 }),
        SqlValue::Text(s) | SqlValue::Decimal(s) => {
            parse_finite(s.trim()).map_or(SqlValue::Null, SqlValue::F64)
        }
        SqlValue::Null | SqlValue::Bytes(_) | SqlValue::DateTime(_) => SqlValue::Null,
    }
}

fn sanitize_decimal(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Text(s) | SqlValue::Decimal(s) => {
            let s = s.trim();
            if is_decimal_literal(s) {
                SqlValue::Decimal(s.to_string())
            } else {
                SqlValue::Null
            }
        }
        SqlValue::I64(n) => SqlValue::Decimal(n.to_string()),
        SqlValue::F64(f) if f.is_finite() => SqlValue::Decimal(f.to_string()),
        SqlValue::Bool(b) => SqlValue::Decimal(if b { "1" } else { "0" }.to_string()),
        SqlValue::F64(_) | SqlValue::Null | SqlValue::Bytes(_) | SqlValue::DateTime(_) => {
            SqlValue::Null
        }
    }
}

/// Parse a float, rejecting NaN and infinities as well as the textual
/// spellings Rust accepts for them.
fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Convert a whole-valued float to i64 when it is representable.
fn f64_to_i64(f: f64) -> Option<i64> {
    // i64::MAX is not exactly representable; 2^63 is the first value out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

/// Match `^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$`.
pub fn is_decimal_literal(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    let digits = |i: &mut usize| {
        let start = *i;
        while *i < b.len() && b[*i].is_ascii_digit() {
            *i += 1;
        }
        *i - start
    };

    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }

    let int_digits = digits(&mut i);
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac_digits = digits(&mut i);
        if int_digits == 0 && frac_digits == 0 {
            return false;
        }
    } else if int_digits == 0 {
        return false;
    }

    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        i += 1;
        if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
            i += 1;
        }
        if digits(&mut i) == 0 {
            return false;
        }
    }

    i == b.len()
}
