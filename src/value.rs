//! Typed Cell Values
//!
//! Raw table cells are decoded against the attribute's declared value type
//! before any statement text is assembled. Missingness is decided here, once,
//! so the query builders only ever see present, well-typed values.

use crate::catalog::AttributeValueType;
use chrono::{NaiveDate, NaiveDateTime, Timelike};

/// Datetime layouts accepted in source tables, tried in order
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%b-%Y", "%d/%m/%Y", "%b %d, %Y"];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

/// A present cell that cannot be read as its declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidValue;

/// True when a raw cell carries no value: absent, blank, or a `nan` marker.
pub fn is_missing(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(s) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("nan")
        }
    }
}

impl Value {
    /// Decode a raw cell as `value_type`.
    ///
    /// Returns `Ok(None)` for missing cells.
    pub fn decode(
        raw: Option<&str>,
        value_type: AttributeValueType,
    ) -> Result<Option<Value>, InvalidValue> {
        if is_missing(raw) {
            return Ok(None);
        }
        let raw = raw.unwrap_or_default();
        let trimmed = raw.trim();

        let value = match value_type {
            AttributeValueType::Integer => Value::Integer(parse_integer(trimmed).ok_or(InvalidValue)?),
            AttributeValueType::Real => {
                let v: f64 = trimmed.parse().map_err(|_| InvalidValue)?;
                if !v.is_finite() {
                    return Err(InvalidValue);
                }
                Value::Real(v)
            }
            AttributeValueType::Boolean => Value::Boolean(parse_boolean(trimmed).ok_or(InvalidValue)?),
            AttributeValueType::DateTime => Value::DateTime(parse_datetime(trimmed).ok_or(InvalidValue)?),
            // Text keeps its surrounding whitespace
            AttributeValueType::Text => Value::Text(raw.to_string()),
        };
        Ok(Some(value))
    }

    /// Render the value as a TypeQL literal. Text is single-quoted, every
    /// other type is emitted bare.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => {
                let s = v.to_string();
                if s.contains('.') {
                    s
                } else {
                    format!("{}.0", s)
                }
            }
            Value::Text(s) => format!("'{}'", escape_text(s)),
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => {
                if dt.nanosecond() == 0 {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                } else {
                    dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
                }
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Integers may arrive as `7.0` when a column passed through a float-typed
/// export; accept those as long as no fraction is lost.
fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f: f64 = s.parse().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_boolean(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
