//! Configuration for execbox.
//!
//! Sources, highest priority first:
//! - command-line flags and their environment variables
//!   (`MAX_EXECUTABLE`, `MAX_CALLDATA`, `MAX_TIMEOUT`, `MAX_STDOUT`,
//!   `MAX_STDERR`, `EXECBOX_*`)
//! - a JSON file or inline JSON given with `--config`
//! - built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::executor::Executor;
use crate::limits::Limits;
use crate::logging::LogFormat;
use crate::os::KillMode;
use crate::prelude::parse_size;

const DEFAULT_KILL_GRACE_MS: u64 = 1000;

fn parse_byte_limit(s: &str) -> Result<usize, String> {
    parse_size(s).map(|bytes| bytes as usize)
}

/// Common configuration arguments
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// Configuration file (JSON file path or JSON string).
    ///
    /// - A file path: --config /etc/execbox.json
    ///
    /// - Inline JSON: --config '{"limits":{"max_timeout_millis":5000}}'
    ///
    #[arg(long = "config", short = 'c', env = "EXECBOX_CONFIG", value_name = "file.json or {json}")]
    pub config: Option<String>,

    // -------------------------------------------------------------------------
    // Execution limits
    // -------------------------------------------------------------------------

    /// Maximum size of the base64-encoded executable (e.g. 1000000, 1mb)
    #[arg(long, env = "MAX_EXECUTABLE", value_name = "SIZE", value_parser = parse_byte_limit)]
    pub max_executable: Option<usize>,

    /// Maximum size of the calldata
    #[arg(long, env = "MAX_CALLDATA", value_name = "SIZE", value_parser = parse_byte_limit)]
    pub max_calldata: Option<usize>,

    /// Maximum timeout a request may ask for, in milliseconds
    #[arg(long, env = "MAX_TIMEOUT", value_name = "MILLIS")]
    pub max_timeout: Option<u64>,

    /// Bytes of stdout retained per execution; the rest is dropped
    #[arg(long, env = "MAX_STDOUT", value_name = "SIZE", value_parser = parse_byte_limit)]
    pub max_stdout: Option<usize>,

    /// Bytes of stderr retained per execution; the rest is dropped
    #[arg(long, env = "MAX_STDERR", value_name = "SIZE", value_parser = parse_byte_limit)]
    pub max_stderr: Option<usize>,

    // -------------------------------------------------------------------------
    // Process handling
    // -------------------------------------------------------------------------

    /// Directory where executables are written before launch
    ///
    /// Defaults to the system temporary directory.
    ///
    #[arg(long, env = "EXECBOX_WORK_DIR", value_name = "PATH")]
    pub work_dir: Option<PathBuf>,

    /// How timed-out processes are killed
    ///
    /// - group: the child and everything it forked (default)
    ///
    /// - direct: only the child
    ///
    #[arg(long, value_enum, env = "EXECBOX_KILL_MODE")]
    pub kill_mode: Option<KillMode>,

    /// How long to wait for a killed process to be reaped, in milliseconds
    #[arg(long, env = "EXECBOX_KILL_GRACE_MS", value_name = "MILLIS")]
    pub kill_grace_ms: Option<u64>,

    /// Port to listen on (server mode)
    #[arg(long, short = 'p', env = "EXECBOX_PORT")]
    pub port: Option<u16>,

    // -------------------------------------------------------------------------
    // Logging/Tracing Options
    // -------------------------------------------------------------------------

    /// Enable verbose output (INFO level logging)
    #[arg(short = 'v', long, env = "EXECBOX_VERBOSE")]
    pub verbose: bool,

    /// Enable debug output (DEBUG level logging)
    #[arg(short = 'd', long, env = "EXECBOX_DEBUG", conflicts_with = "verbose")]
    pub debug: bool,

    /// Quiet mode - only show errors
    #[arg(short = 'q', long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Silent mode - suppress all terminal log output
    #[arg(long, short = 's', conflicts_with_all = ["verbose", "debug", "quiet"])]
    pub silent: bool,

    /// Log output format
    #[arg(long, short = 'L', value_enum, env = "EXECBOX_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Write debug logs to file
    #[arg(long, short = 'l', env = "EXECBOX_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// Fully merged configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub limits: Limits,
    /// Artifact directory; system temp dir when unset
    pub work_dir: Option<PathBuf>,
    pub kill_mode: KillMode,
    pub kill_grace_ms: u64,
    pub port: Option<u16>,

    pub verbose: bool,
    pub debug: bool,
    pub quiet: bool,
    pub silent: bool,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            work_dir: None,
            kill_mode: KillMode::default(),
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
            port: None,
            verbose: false,
            debug: false,
            quiet: false,
            silent: false,
            log_format: LogFormat::default(),
            log_file: None,
        }
    }
}

impl GlobalConfig {
    /// Load the config file (if any), apply CLI/env overrides and check the
    /// resulting limits.
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(input) => {
                let json = load_json_string(input)?;
                serde_json::from_str(&json)
                    .map_err(|e| anyhow::anyhow!("Failed to parse config JSON: {}", e))?
            }
            None => Self::default(),
        };
        config.merge_args(args);

        // Re-checked so zero values from any source are rejected
        let limits = config.limits;
        config.limits = Limits::new(
            limits.max_executable_bytes,
            limits.max_calldata_bytes,
            limits.max_timeout_millis,
            limits.max_stdout_bytes,
            limits.max_stderr_bytes,
        )
        .context("Invalid execution limits")?;

        Ok(config)
    }

    fn merge_args(&mut self, args: &ConfigArgs) {
        let limits = &mut self.limits;
        if let Some(v) = args.max_executable {
            limits.max_executable_bytes = v;
        }
        if let Some(v) = args.max_calldata {
            limits.max_calldata_bytes = v;
        }
        if let Some(v) = args.max_timeout {
            limits.max_timeout_millis = v;
        }
        if let Some(v) = args.max_stdout {
            limits.max_stdout_bytes = v;
        }
        if let Some(v) = args.max_stderr {
            limits.max_stderr_bytes = v;
        }

        if let Some(dir) = &args.work_dir {
            self.work_dir = Some(dir.clone());
        }
        if let Some(mode) = args.kill_mode {
            self.kill_mode = mode;
        }
        if let Some(ms) = args.kill_grace_ms {
            self.kill_grace_ms = ms;
        }
        if let Some(port) = args.port {
            self.port = Some(port);
        }

        self.verbose |= args.verbose;
        self.debug |= args.debug;
        self.quiet |= args.quiet;
        self.silent |= args.silent;
        if let Some(format) = &args.log_format {
            self.log_format = format.clone();
        }
        if let Some(log_file) = &args.log_file {
            self.log_file = Some(log_file.clone());
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(crate::os::artifact::default_work_dir)
    }

    /// Build the executor shared by all requests
    pub fn executor(&self) -> Executor {
        Executor::new(
            self.limits,
            self.work_dir(),
            self.kill_mode,
            Duration::from_millis(self.kill_grace_ms),
        )
    }

    /// Initialize tracing from the merged logging options.
    ///
    /// Call once early in main(), after the config is built.
    pub fn init_tracing(&self) {
        crate::logging::init_tracing(crate::logging::TracingConfig {
            verbose: self.verbose,
            debug: self.debug,
            quiet: self.quiet,
            silent: self.silent,
            format: self.log_format.clone(),
            log_file: self.log_file.clone(),
        });
    }
}

/// Accept either inline JSON or a path to a JSON file
fn load_json_string(input: &str) -> Result<String> {
    if input.trim_start().starts_with('{') {
        return Ok(input.to_string());
    }
    let path = std::path::Path::new(input);
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> ConfigArgs {
        let mut argv = vec!["execbox"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::from_args(&ConfigArgs::default()).unwrap();
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.kill_mode, KillMode::Group);
        assert_eq!(config.kill_grace_ms, DEFAULT_KILL_GRACE_MS);
        assert!(config.port.is_none());
    }

    #[test]
    fn test_cli_limits() {
        let args = parse(&["--max-stdout", "10", "--max-stderr", "64kb", "--max-timeout", "5000"]);
        let config = GlobalConfig::from_args(&args).unwrap();
        assert_eq!(config.limits.max_stdout_bytes, 10);
        assert_eq!(config.limits.max_stderr_bytes, 64 * 1024);
        assert_eq!(config.limits.max_timeout_millis, 5000);
    }

    #[test]
    fn test_inline_json_then_cli_override() {
        let args = parse(&[
            "--config",
            r#"{"limits": {"max_timeout_millis": 9000, "max_stdout_bytes": 77}, "kill_mode": "direct"}"#,
            "--max-stdout",
            "88",
        ]);
        let config = GlobalConfig::from_args(&args).unwrap();
        assert_eq!(config.limits.max_timeout_millis, 9000);
        assert_eq!(config.limits.max_stdout_bytes, 88);
        // Unspecified limits keep their defaults
        assert_eq!(config.limits.max_calldata_bytes, Limits::default().max_calldata_bytes);
        assert_eq!(config.kill_mode, KillMode::Direct);
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("execbox.json");
        std::fs::write(&path, r#"{"port": 9999, "kill_grace_ms": 250}"#).unwrap();

        let args = parse(&["--config", path.to_str().unwrap()]);
        let config = GlobalConfig::from_args(&args).unwrap();
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.kill_grace_ms, 250);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let args = parse(&["--max-timeout", "0"]);
        let err = GlobalConfig::from_args(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("MAX_TIMEOUT must be greater than 0"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = parse(&["--config", "/nonexistent/execbox.json"]);
        assert!(GlobalConfig::from_args(&args).is_err());
    }
}
