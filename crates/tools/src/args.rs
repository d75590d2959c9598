//! Argument extraction with field-level validation errors.
//!
//! Model-supplied arguments are never trusted: every accessor checks the
//! JSON type, and failures name the offending field. Nothing is coerced;
//! `"true"` is not a boolean and `5` is not a string.

use chrono::{DateTime, Utc};
use remindly_core::error::ToolError;
use serde_json::{Map, Value};

pub type Args = Map<String, Value>;

/// View the arguments as an object.
pub fn object(arguments: &Value) -> Result<&Args, ToolError> {
    arguments
        .as_object()
        .ok_or_else(|| ToolError::invalid("arguments", "expected a JSON object"))
}

fn present<'a>(args: &'a Args, field: &str) -> Option<&'a Value> {
    args.get(field).filter(|v| !v.is_null())
}

/// A required, non-blank string.
pub fn required_str(args: &Args, field: &str) -> Result<String, ToolError> {
    optional_str(args, field)?.ok_or_else(|| ToolError::invalid(field, "is required"))
}

/// An optional string; present values must be non-blank and are kept as supplied.
pub fn optional_str(args: &Args, field: &str) -> Result<Option<String>, ToolError> {
    match present(args, field) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ToolError::invalid(field, "must not be blank")),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ToolError::invalid(field, format!("expected a string, got {}", kind(other)))),
    }
}

pub fn optional_bool(args: &Args, field: &str) -> Result<Option<bool>, ToolError> {
    match present(args, field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ToolError::invalid(field, format!("expected a boolean, got {}", kind(other)))),
    }
}

/// An optional RFC 3339 timestamp, normalized to UTC.
pub fn optional_datetime(args: &Args, field: &str) -> Result<Option<DateTime<Utc>>, ToolError> {
    let Some(raw) = optional_str(args, field)? else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| {
            ToolError::invalid(
                field,
                format!("expected an RFC 3339 timestamp like 2025-03-10T09:00:00Z ({e})"),
            )
        })
}

/// An optional value from a closed set, parsed with its `FromStr`.
pub fn optional_enum<T>(args: &Args, field: &str) -> Result<Option<T>, ToolError>
where
    T: std::str::FromStr<Err = String>,
{
    match optional_str(args, field)? {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|reason| ToolError::invalid(field, reason)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
