use std::path::PathBuf;
use std::time::Duration;

use crate::limits::Limits;
use crate::os::artifact::{decode_calldata, decode_executable};
use crate::os::{ExecutionResult, Job, KillMode, Outcome, ProcessRunner, RunnerConfig};
use crate::request::{self, ExecutionRequest, ValidationError};

/// Runs validated requests. One instance serves every request for the
/// lifetime of the process; it holds no per-request state.
#[derive(Debug)]
pub struct Executor {
    limits: Limits,
    runner: ProcessRunner,
}

impl Executor {
    pub fn new(limits: Limits, work_dir: PathBuf, kill_mode: KillMode, kill_grace: Duration) -> Self {
        let runner = ProcessRunner::new(RunnerConfig {
            work_dir,
            stdout_cap: limits.max_stdout_bytes,
            stderr_cap: limits.max_stderr_bytes,
            kill_mode,
            kill_grace,
        });
        Self { limits, runner }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Validate a raw request body and run it.
    ///
    /// `Err` is only ever a validation error: nothing is spawned in that case.
    /// Execution failures come back as an `Ok` result with `err` set.
    pub async fn execute(&self, body: &[u8]) -> Result<ExecutionResult, ValidationError> {
        let request = request::validate(body, &self.limits)?;
        Ok(self.run(request).await)
    }

    pub async fn run(&self, request: ExecutionRequest) -> ExecutionResult {
        let executable = match decode_executable(&request.executable) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting executable payload");
                return Outcome::LaunchFailed.into();
            }
        };

        let job = Job {
            executable,
            stdin: decode_calldata(&request.calldata),
            timeout: request.timeout(),
        };
        self.runner.run(job).await.into()
    }
}
