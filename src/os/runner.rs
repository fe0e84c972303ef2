//! Child process execution with a wall-clock limit and capped output.
//!
//! One run goes through `Spawning -> Running -> {Completed, TimedOut,
//! LaunchFailed}`. While running, four activities are joined: feeding stdin,
//! draining stdout, draining stderr and waiting for exit. A single timer races
//! that join; if it wins, the child is killed through the configured
//! [`Terminator`] and the run is reported as timed out.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};

use super::artifact::RunnableArtifact;
use super::kill::{KillMode, Terminator};
use super::{OutputCapture, Outcome};

/// How many times to retry a spawn that failed with ETXTBSY
const SPAWN_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory where artifacts are written
    pub work_dir: PathBuf,
    pub stdout_cap: usize,
    pub stderr_cap: usize,
    pub kill_mode: KillMode,
    /// How long to wait for a killed child to be reaped
    pub kill_grace: Duration,
}

/// Everything needed for one execution
#[derive(Debug, Clone)]
pub struct Job {
    pub executable: Vec<u8>,
    pub stdin: Vec<u8>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct ProcessRunner {
    work_dir: PathBuf,
    stdout_cap: usize,
    stderr_cap: usize,
    kill_grace: Duration,
    terminator: Box<dyn Terminator>,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let terminator = config.kill_mode.terminator();
        Self::with_terminator(config, terminator)
    }

    /// Build a runner around a custom termination backend
    pub fn with_terminator(config: RunnerConfig, terminator: Box<dyn Terminator>) -> Self {
        Self {
            work_dir: config.work_dir,
            stdout_cap: config.stdout_cap,
            stderr_cap: config.stderr_cap,
            kill_grace: config.kill_grace,
            terminator,
        }
    }

    /// Run a job to completion or timeout. Never fails: every problem maps
    /// to an [`Outcome`]. The artifact is removed on every path.
    pub async fn run(&self, job: Job) -> Outcome {
        let artifact = match RunnableArtifact::create(&self.work_dir, &job.executable) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::debug!(error = %e, "failed to materialize executable");
                return Outcome::LaunchFailed;
            }
        };

        let outcome = self.run_artifact(artifact.path(), &job).await;

        if let Err(e) = artifact.remove() {
            tracing::warn!(error = %e, "failed to remove artifact");
        }

        outcome
    }

    async fn run_artifact(&self, path: &Path, job: &Job) -> Outcome {
        let mut child = match self.spawn(path).await {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(error = %e, "failed to launch executable");
                return Outcome::LaunchFailed;
            }
        };

        // Taken now: `id()` returns None once the child has been reaped
        let pid = child.id();
        tracing::debug!(pid = ?pid, timeout_ms = job.timeout.as_millis() as u64, "process spawned");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut stdout_capture = OutputCapture::new(self.stdout_cap);
        let mut stderr_capture = OutputCapture::new(self.stderr_cap);

        let running = async {
            let (status, _, _, _) = tokio::join!(
                child.wait(),
                feed_stdin(stdin, &job.stdin),
                drain(stdout, &mut stdout_capture),
                drain(stderr, &mut stderr_capture),
            );
            status
        };
        let finished = tokio::time::timeout(job.timeout, running).await;

        match finished {
            Ok(Ok(status)) => {
                let exit_code = exit_code(status);
                tracing::info!(
                    pid = ?pid,
                    exit_code,
                    stdout_len = stdout_capture.len(),
                    stderr_len = stderr_capture.len(),
                    stdout_truncated = stdout_capture.is_truncated(),
                    stderr_truncated = stderr_capture.is_truncated(),
                    "process completed"
                );
                Outcome::Completed {
                    exit_code,
                    stdout: stdout_capture,
                    stderr: stderr_capture,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(pid = ?pid, error = %e, "failed to wait for process");
                self.kill(&mut child, pid).await;
                Outcome::LaunchFailed
            }
            Err(_elapsed) => {
                tracing::warn!(pid = ?pid, timeout_ms = job.timeout.as_millis() as u64, "wall clock timeout exceeded, killing process");
                self.kill(&mut child, pid).await;
                Outcome::TimedOut
            }
        }
    }

    async fn spawn(&self, path: &Path) -> std::io::Result<Child> {
        let mut attempt = 0;
        loop {
            let mut command = Command::new(path);
            command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            self.terminator.prepare(&mut command);

            match command.spawn() {
                // A concurrent fork elsewhere in this process can briefly hold
                // the artifact's write descriptor open
                Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < SPAWN_RETRIES => {
                    attempt += 1;
                    tracing::debug!(attempt, "executable busy, retrying spawn");
                    tokio::time::sleep(Duration::from_millis(10 * attempt as u64)).await;
                }
                result => return result,
            }
        }
    }

    async fn kill(&self, child: &mut Child, pid: Option<u32>) {
        let reaped = matches!(child.try_wait(), Ok(Some(_)));

        match pid {
            Some(pid) if !reaped || self.terminator.signals_group() => {
                if let Err(e) = self.terminator.terminate(pid) {
                    tracing::warn!(pid, error = %e, "failed to terminate process");
                }
            }
            Some(_) => {}
            None => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "failed to kill process");
                }
            }
        }

        if tokio::time::timeout(self.kill_grace, child.wait()).await.is_err() {
            tracing::warn!(pid = ?pid, "process not reaped within grace period");
        }
    }
}

/// Write the whole payload and close the pipe.
async fn feed_stdin(stdin: Option<ChildStdin>, data: &[u8]) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if data.is_empty() {
        return;
    }
    if let Err(e) = stdin.write_all(data).await {
        // The child is free to exit without reading its input
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            tracing::debug!(error = %e, "failed to write stdin");
        }
    }
}

async fn drain<R>(reader: Option<R>, capture: &mut OutputCapture)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    if let Err(e) = capture.drain(reader).await {
        tracing::debug!(error = %e, "failed to read process output");
    }
}

/// Exit code, or 128 + signal number for a signalled process
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::ExecutionResult;
    use crate::os::kill::GroupKill;

    fn runner(dir: &Path, cap: usize) -> ProcessRunner {
        ProcessRunner::new(RunnerConfig {
            work_dir: dir.to_path_buf(),
            stdout_cap: cap,
            stderr_cap: cap,
            kill_mode: KillMode::Group,
            kill_grace: Duration::from_secs(1),
        })
    }

    fn job(script: &str, stdin: &str, timeout_ms: u64) -> Job {
        Job {
            executable: script.as_bytes().to_vec(),
            stdin: stdin.as_bytes().to_vec(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn run(script: &str, stdin: &str, timeout_ms: u64, cap: usize) -> ExecutionResult {
        let dir = tempfile::tempdir().unwrap();
        let outcome = runner(dir.path(), cap).run(job(script, stdin, timeout_ms)).await;
        ExecutionResult::from(outcome)
    }

    #[tokio::test]
    async fn test_hello() {
        let result = run("#!/bin/sh\necho hello\n", "", 2000, 1024).await;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
        assert_eq!(result.err, "");
    }

    #[tokio::test]
    async fn test_stdin_is_calldata() {
        let result = run("#!/bin/sh\ncat\n", "bitcoin", 2000, 1024).await;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout, "bitcoin");
    }

    #[tokio::test]
    async fn test_exit_code_and_stderr() {
        let result = run("#!/bin/sh\necho oops >&2\nexit 3\n", "", 2000, 1024).await;
        assert_eq!(result.returncode, 3);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "oops\n");
        assert_eq!(result.err, "");
    }

    #[tokio::test]
    async fn test_bad_interpreter_fails_launch() {
        let result = run("#!/usr/bin/enveeeeeeeee\necho hello\n", "", 2000, 1024).await;
        assert_eq!(result.returncode, 126);
        assert_eq!(result.err, "Execution fail");
        assert_eq!(result.stdout, "");
    }

    #[tokio::test]
    async fn test_not_executable_format_fails_launch() {
        let result = run("just some text\n", "", 2000, 1024).await;
        assert_eq!(result.returncode, 126);
        assert_eq!(result.err, "Execution fail");
    }

    #[tokio::test]
    async fn test_empty_executable_fails_launch() {
        let result = run("", "input", 2000, 1024).await;
        assert_eq!(result.returncode, 126);
        assert_eq!(result.err, "Execution fail");
    }

    #[tokio::test]
    async fn test_timeout_discards_output() {
        let result = run("#!/bin/sh\necho partial\nsleep 5\n", "", 200, 1024).await;
        assert_eq!(result.returncode, 111);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "");
        assert_eq!(result.err, "Execution time limit exceeded");
    }

    #[tokio::test]
    async fn test_sleep_within_timeout() {
        let result = run("#!/bin/sh\nsleep 0.2\necho hello\n", "", 3000, 1024).await;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_infinite_output_times_out() {
        let result = run("#!/bin/sh\nwhile true; do echo hello; done\n", "", 300, 1024).await;
        assert_eq!(result.returncode, 111);
        assert_eq!(result.err, "Execution time limit exceeded");
    }

    #[tokio::test]
    async fn test_stdout_truncated_to_cap() {
        let script = "#!/bin/sh\nfor i in 0 1 2 3 4 5 6 7 8 9; do echo $i; done\n";
        let result = run(script, "", 2000, 10).await;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout, "0\n1\n2\n3\n4\n");
        assert_eq!(result.err, "");
    }

    #[tokio::test]
    async fn test_stderr_truncated_to_cap() {
        let script = "#!/bin/sh\necho 'Traceback (most recent call last):' >&2\nexit 1\n";
        let result = run(script, "", 2000, 10).await;
        assert_eq!(result.returncode, 1);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "Traceback ");
        assert_eq!(result.err, "");
    }

    #[tokio::test]
    async fn test_large_output_past_cap_does_not_block() {
        // Well beyond a pipe buffer; the child only exits if we keep reading
        let script = "#!/bin/sh\nhead -c 1000000 /dev/zero\necho done >&2\n";
        let result = run(script, "", 5000, 16).await;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout.len(), 16);
        assert_eq!(result.stderr, "done\n");
    }

    #[tokio::test]
    async fn test_large_stdin_unread_by_child() {
        let calldata = "x".repeat(1 << 20);
        let result = run("#!/bin/sh\necho ignored\n", &calldata, 2000, 1024).await;
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout, "ignored\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!(
            "#!/bin/sh\n(sleep 1; touch {}) &\nsleep 5\n",
            marker.display()
        );
        let runner = ProcessRunner::with_terminator(
            RunnerConfig {
                work_dir: dir.path().to_path_buf(),
                stdout_cap: 1024,
                stderr_cap: 1024,
                kill_mode: KillMode::Group,
                kill_grace: Duration::from_secs(1),
            },
            Box::new(GroupKill),
        );

        let outcome = runner.run(job(&script, "", 200)).await;
        assert!(matches!(outcome, Outcome::TimedOut));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_artifact_removed_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 1024);

        runner.run(job("#!/bin/sh\nexit 0\n", "", 2000)).await;
        runner.run(job("#!/bin/sh\nsleep 5\n", "", 100)).await;
        runner.run(job("#!/nonexistent/interpreter\n", "", 2000)).await;

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), 1024);
        let script = "#!/bin/sh\nread line\necho \"got $line\"\necho warn >&2\nexit 7\n";

        let first = ExecutionResult::from(runner.run(job(script, "abc\n", 2000)).await);
        let second = ExecutionResult::from(runner.run(job(script, "abc\n", 2000)).await);
        assert_eq!(first, second);
        assert_eq!(first.stdout, "got abc\n");
        assert_eq!(first.returncode, 7);
    }

    #[test]
    fn test_exit_code_from_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_code(ExitStatus::from_raw(libc::SIGKILL)), 128 + 9);
        assert_eq!(exit_code(ExitStatus::from_raw(2 << 8)), 2);
    }
}
