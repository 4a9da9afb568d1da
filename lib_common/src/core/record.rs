//! # Record Model
//!
//! A cached row is a semi-structured JSON object. The only field the engine
//! understands is the date key, which is either an 8-digit integer
//! (`20250105`) or an 8-digit zero-padded string (`"20250105"`). Its
//! canonical string form sorts lexicographically in chronological order,
//! which is what the range filter relies on. No calendar parsing happens
//! anywhere in this crate.

use serde_json::{Map, Number, Value};

/// Name of the date key every cached record is expected to carry.
pub const TRADE_DATE_KEY: &str = "tradeDateKey";

/// A single cached row: field name to JSON value.
pub type Record = Map<String, Value>;

/// Renders a JSON number the way the date key and request fields expect it.
///
/// Integers print as plain decimals (`20250105`). Floats with no fractional
/// part print as their integer value, so `20250105.0` still compares like
/// the integer key it represents. Floats never use exponent notation.
pub fn number_to_key(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        return i.to_string();
    }
    if let Some(u) = number.as_u64() {
        return u.to_string();
    }
    match number.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.0}", f),
        Some(f) if f.is_finite() => f.to_string(),
        _ => number.to_string(),
    }
}

/// Canonical string form of a date-key value.
///
/// Returns `None` for anything that is neither a string nor a number, and
/// for the empty string.
pub fn canonical_key(value: &Value) -> Option<String> {
    let key = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_key(n),
        _ => return None,
    };
    if key.is_empty() { None } else { Some(key) }
}

/// Canonical `tradeDateKey` of a record, if it has a usable one.
pub fn trade_date_key(record: &Record) -> Option<String> {
    record.get(TRADE_DATE_KEY).and_then(canonical_key)
}
