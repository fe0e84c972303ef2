use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OutputCapture;

/// Return code reported when the artifact could not be launched
pub const LAUNCH_FAILED_CODE: i32 = 126;
/// Return code reported when the wall-clock limit was hit
pub const TIMED_OUT_CODE: i32 = 111;

pub const ERR_EXECUTION_FAIL: &str = "Execution fail";
pub const ERR_TIME_LIMIT: &str = "Execution time limit exceeded";

/// Terminal state of one run
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The process exited on its own
    Completed {
        exit_code: i32,
        stdout: OutputCapture,
        stderr: OutputCapture,
    },
    /// The timer fired and the process was killed
    TimedOut,
    /// The payload could not be decoded, materialized or executed
    LaunchFailed,
}

/// The per-request result handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResult {
    #[schema(example = 0)]
    pub returncode: i32,
    #[schema(example = "hello\n")]
    pub stdout: String,
    #[schema(example = "")]
    pub stderr: String,
    /// Classified error, empty when the run completed
    #[schema(example = "")]
    pub err: String,
}

impl ExecutionResult {
    fn failed(returncode: i32, err: &str) -> Self {
        Self {
            returncode,
            stdout: String::new(),
            stderr: String::new(),
            err: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.err.is_empty()
    }
}

impl From<Outcome> for ExecutionResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed { exit_code, stdout, stderr } => Self {
                returncode: exit_code,
                stdout: stdout.into_string(),
                stderr: stderr.into_string(),
                err: String::new(),
            },
            // Partial output of a killed run is never reported
            Outcome::TimedOut => Self::failed(TIMED_OUT_CODE, ERR_TIME_LIMIT),
            Outcome::LaunchFailed => Self::failed(LAUNCH_FAILED_CODE, ERR_EXECUTION_FAIL),
        }
    }
}
