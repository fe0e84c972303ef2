use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name} must be greater than 0")]
pub struct LimitsError {
    pub name: &'static str,
}

/// Process-wide execution limits, fixed at startup and shared read-only by
/// every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Limits {
    /// Maximum length of the encoded executable
    #[schema(example = 1000000)]
    pub max_executable_bytes: usize,
    /// Maximum length of the calldata
    #[schema(example = 1000000)]
    pub max_calldata_bytes: usize,
    /// Upper bound for a request's `timeout`
    #[schema(example = 3000)]
    pub max_timeout_millis: u64,
    #[schema(example = 1000000)]
    pub max_stdout_bytes: usize,
    #[schema(example = 1000000)]
    pub max_stderr_bytes: usize,
}

impl Limits {
    pub fn new(
        max_executable_bytes: usize,
        max_calldata_bytes: usize,
        max_timeout_millis: u64,
        max_stdout_bytes: usize,
        max_stderr_bytes: usize,
    ) -> Result<Self, LimitsError> {
        let checks = [
            ("MAX_EXECUTABLE", max_executable_bytes as u64),
            ("MAX_CALLDATA", max_calldata_bytes as u64),
            ("MAX_TIMEOUT", max_timeout_millis),
            ("MAX_STDOUT", max_stdout_bytes as u64),
            ("MAX_STDERR", max_stderr_bytes as u64),
        ];
        if let Some((name, _)) = checks.into_iter().find(|(_, v)| *v == 0) {
            return Err(LimitsError { name });
        }

        Ok(Self {
            max_executable_bytes,
            max_calldata_bytes,
            max_timeout_millis,
            max_stdout_bytes,
            max_stderr_bytes,
        })
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_executable_bytes: 1_000_000,
            max_calldata_bytes: 1_000_000,
            max_timeout_millis: 3000,
            max_stdout_bytes: 1_000_000,
            max_stderr_bytes: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_new() {
        let limits = Limits::new(10, 20, 30, 40, 50).unwrap();
        assert_eq!(limits.max_calldata_bytes, 20);
        assert_eq!(limits.max_timeout_millis, 30);
    }

    #[test]
    fn test_limits_reject_zero() {
        assert_eq!(
            Limits::new(10, 20, 0, 40, 50),
            Err(LimitsError { name: "MAX_TIMEOUT" })
        );
        assert_eq!(
            Limits::new(10, 20, 30, 40, 0).unwrap_err().to_string(),
            "MAX_STDERR must be greater than 0"
        );
    }
}
