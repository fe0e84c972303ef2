//! Request validation.
//!
//! Checks run in a fixed order and the first failure wins. Empty
//! `executable` or `calldata` strings are accepted here; an empty executable
//! surfaces later as a launch failure.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::limits::Limits;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid JSON request format")]
    InvalidJson,
    #[error("executable field is missing from JSON request")]
    MissingExecutable,
    #[error("calldata field is missing from JSON request")]
    MissingCalldata,
    #[error("timeout field is missing from JSON request")]
    MissingTimeout,
    #[error("timeout field is empty")]
    EmptyTimeout,
    #[error("Runtime must more than 0")]
    NonPositiveTimeout,
    #[error("Runtime exceeded max size")]
    TimeoutTooLarge,
    #[error("Executable exceeded max size")]
    ExecutableTooLarge,
    #[error("Calldata exceeded max size")]
    CalldataTooLarge,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Base64-encoded executable
    pub executable: String,
    /// Text handed to the child on stdin
    pub calldata: String,
    pub timeout_millis: u64,
}

impl ExecutionRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }
}

/// Validate a raw JSON request body.
pub fn validate(body: &[u8], limits: &Limits) -> Result<ExecutionRequest, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)?;
    match value {
        Value::Object(fields) => validate_fields(&fields, limits),
        _ => Err(ValidationError::InvalidJson),
    }
}

/// Validate an already-parsed field map.
pub fn validate_fields(
    fields: &Map<String, Value>,
    limits: &Limits,
) -> Result<ExecutionRequest, ValidationError> {
    let executable = fields.get("executable").ok_or(ValidationError::MissingExecutable)?;
    let calldata = fields.get("calldata").ok_or(ValidationError::MissingCalldata)?;
    let timeout = fields.get("timeout").ok_or(ValidationError::MissingTimeout)?;

    let timeout = parse_timeout(timeout).ok_or(ValidationError::EmptyTimeout)?;
    if timeout <= 0 {
        return Err(ValidationError::NonPositiveTimeout);
    }
    if timeout > limits.max_timeout_millis as i128 {
        return Err(ValidationError::TimeoutTooLarge);
    }

    let executable = field_text(executable);
    if executable.len() > limits.max_executable_bytes {
        return Err(ValidationError::ExecutableTooLarge);
    }
    let calldata = field_text(calldata);
    if calldata.len() > limits.max_calldata_bytes {
        return Err(ValidationError::CalldataTooLarge);
    }

    Ok(ExecutionRequest {
        executable,
        calldata,
        // Bounded by max_timeout_millis above
        timeout_millis: timeout as u64,
    })
}

/// Interpret a timeout value as whole milliseconds.
///
/// Integers outside i64/u64 arrive as floats and saturate, keeping their
/// sign. Returns None for null, empty or non-numeric values.
fn parse_timeout(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i as i128)
            } else if let Some(u) = n.as_u64() {
                Some(u as i128)
            } else {
                n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i128)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<i128>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i128)
            })
        }
        _ => None,
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
