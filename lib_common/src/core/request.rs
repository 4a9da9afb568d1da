//! # Request Interpreter
//!
//! Inbound messages are loosely shaped: the date bounds may sit at the top
//! level or one level down under `arg`, and may arrive as strings or numbers.
//! This module turns such a message into an [`InboundRequest`] through an
//! explicit, ordered field-resolution policy:
//!
//! 1. `startDate` / `endDate` at the top level;
//! 2. otherwise `arg.startDate` / `arg.endDate`;
//! 3. the correlation token from `pluginArg.instanceId` (strings only).
//!
//! The first candidate path holding a string or a number wins. A candidate
//! holding any other JSON type is skipped.

use serde_json::{Number, Value};
use thiserror::Error;

use super::query_engine::DateRange;
use super::record::number_to_key;

/// Candidate paths for the range start, in resolution order.
pub const START_DATE_PATHS: &[&[&str]] = &[&["startDate"], &["arg", "startDate"]];
/// Candidate paths for the range end, in resolution order.
pub const END_DATE_PATHS: &[&[&str]] = &[&["endDate"], &["arg", "endDate"]];
/// Where the caller's correlation token lives.
pub const CORRELATION_PATH: &[&str] = &["pluginArg", "instanceId"];
/// Where the routing name of the target service lives.
pub const TARGET_PATH: &[&str] = &["pluginArg", "name"];

/// A resolved field, borrowed from the message it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// The field was a JSON string.
    Text(&'a str),
    /// The field was a JSON number.
    Number(&'a Number),
}

impl FieldValue<'_> {
    /// String form used for comparisons. Numbers are printed in decimal
    /// without zero padding.
    pub fn to_key_string(&self) -> String {
        match self {
            FieldValue::Text(s) => (*s).to_string(),
            FieldValue::Number(n) => number_to_key(n),
        }
    }
}

/// Why an inbound message could not be turned into a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The message body is not a JSON object.
    #[error("request body is not a JSON object")]
    NotAnObject,
    /// A bound is absent, or resolved to an empty string.
    #[error("request field `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// The query extracted from one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    /// Inclusive range to filter on.
    pub range: DateRange,
    /// Opaque caller token to echo back, if the message carried one.
    pub correlation_token: Option<String>,
}

fn lookup<'a>(message: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(message, |node, key| node.get(*key))
}

/// Walks `candidate_paths` in order and returns the first value that is a
/// string or a number.
pub fn resolve_field<'a>(message: &'a Value, candidate_paths: &[&[&str]]) -> Option<FieldValue<'a>> {
    candidate_paths
        .iter()
        .filter_map(|path| lookup(message, path))
        .find_map(|value| match value {
            Value::String(s) => Some(FieldValue::Text(s.as_str())),
            Value::Number(n) => Some(FieldValue::Number(n)),
            _ => None,
        })
}

/// Correlation token of a message, when `pluginArg.instanceId` is a string.
///
/// Safe to call on any message, so callers can capture the token before
/// validation and keep error replies correlatable.
pub fn correlation_token(message: &Value) -> Option<String> {
    lookup(message, CORRELATION_PATH)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Name of the service a message is addressed to (`pluginArg.name`).
pub fn target_name(message: &Value) -> Option<&str> {
    lookup(message, TARGET_PATH).and_then(Value::as_str)
}

fn required(message: &Value, paths: &[&[&str]], field: &'static str) -> Result<String, RequestError> {
    resolve_field(message, paths)
        .map(|v| v.to_key_string())
        .filter(|s| !s.is_empty())
        .ok_or(RequestError::MissingField(field))
}

/// Resolves the date range of a message.
pub fn resolve_range(message: &Value) -> Result<DateRange, RequestError> {
    if !message.is_object() {
        return Err(RequestError::NotAnObject);
    }
    let start = required(message, START_DATE_PATHS, "startDate")?;
    let end = required(message, END_DATE_PATHS, "endDate")?;
    Ok(DateRange { start, end })
}

impl InboundRequest {
    /// Interprets a whole message: range plus correlation token.
    pub fn from_message(message: &Value) -> Result<Self, RequestError> {
        let range = resolve_range(message)?;
        Ok(Self {
            range,
            correlation_token: correlation_token(message),
        })
    }
}
