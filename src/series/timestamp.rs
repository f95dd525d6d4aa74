use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

use crate::series::grid::TimeSlot;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unsupported timestamp type: {0}")]
    UnsupportedType(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("timestamp out of range: {0}")]
    OutOfRange(i64),
}

/// Naive layouts taken to already be local wall-clock time
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Convert a raw timestamp field into local wall-clock time at `offset`.
///
/// Accepts `/Date(<ms>)/` wrappers (optionally with a `±HHMM` suffix),
/// RFC 3339 strings, naive date-times and bare epoch-millisecond numbers.
pub fn normalize(raw: &Value, offset: &FixedOffset) -> Result<NaiveDateTime, NormalizeError> {
    match raw {
        Value::String(s) => normalize_str(s.trim(), offset),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .ok_or_else(|| NormalizeError::InvalidTimestamp(n.to_string()))?;
            from_epoch_millis(millis, offset)
        }
        other => Err(NormalizeError::UnsupportedType(type_name(other).to_string())),
    }
}

/// Grid slot for a raw timestamp; seconds and finer are discarded
pub fn slot_of(raw: &Value, offset: &FixedOffset) -> Result<TimeSlot, NormalizeError> {
    normalize(raw, offset).map(|local| TimeSlot::containing(local.time()))
}

fn normalize_str(s: &str, offset: &FixedOffset) -> Result<NaiveDateTime, NormalizeError> {
    if let Some(millis) = embedded_epoch_millis(s) {
        let millis = millis.ok_or_else(|| NormalizeError::InvalidTimestamp(s.to_string()))?;
        return from_epoch_millis(millis, offset);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(offset).naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| NormalizeError::InvalidTimestamp(s.to_string()))
}

/// `None` if `s` is not a `/Date(...)/` wrapper at all, `Some(None)` if it is
/// one but the payload is not a millisecond count.
fn embedded_epoch_millis(s: &str) -> Option<Option<i64>> {
    let inner = s.strip_prefix("/Date(")?.strip_suffix(")/")?;

    // Zone designator after the millis, e.g. "1704067200000-0300"
    let digits = match inner.get(1..).and_then(|rest| rest.find(['+', '-'])) {
        Some(pos) => &inner[..pos + 1],
        None => inner,
    };

    Some(digits.parse::<i64>().ok())
}

fn from_epoch_millis(millis: i64, offset: &FixedOffset) -> Result<NaiveDateTime, NormalizeError> {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(offset).naive_local())
        .ok_or(NormalizeError::OutOfRange(millis))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
