use std::io::IsTerminal;
use std::process::exit;

use anyhow::{Context, Result};
use base64::Engine;
use clap::Args;
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;

use crate::config::GlobalConfig;
use crate::os::ExecutionResult;
use crate::request;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Calldata passed on stdin (supports @file syntax to read from a file)
    ///
    /// When omitted, piped stdin is forwarded instead.
    #[arg(short = 'i', long, visible_alias = "in")]
    calldata: Option<String>,

    /// Timeout in milliseconds (defaults to MAX_TIMEOUT)
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,

    /// Path to the executable (a script with a #! line or a binary)
    exe: String,
}

async fn read_calldata(args: &RunArgs, limit: usize) -> Result<String> {
    if let Some(arg) = &args.calldata {
        return match arg.strip_prefix('@') {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read calldata from file: {}", path)),
            None => Ok(arg.clone()),
        };
    }

    if std::io::stdin().is_terminal() {
        return Ok(String::new());
    }

    // One byte over the limit is enough for validation to reject it
    let mut buffer = Vec::new();
    tokio::io::stdin()
        .take(limit as u64 + 1)
        .read_to_end(&mut buffer)
        .await
        .context("Failed to read stdin")?;
    String::from_utf8(buffer).context("stdin is not valid UTF-8")
}

/// Run a local file through the same validation and execution path as the
/// HTTP service.
pub async fn execute_local(args: &RunArgs, config: &GlobalConfig) -> Result<ExecutionResult> {
    let exe = tokio::fs::read(&args.exe)
        .await
        .with_context(|| format!("Failed to read executable from {}", args.exe))?;
    let calldata = read_calldata(args, config.limits.max_calldata_bytes).await?;
    let timeout = args.timeout.unwrap_or(config.limits.max_timeout_millis);

    let mut fields = Map::new();
    fields.insert(
        "executable".to_string(),
        Value::String(base64::engine::general_purpose::STANDARD.encode(&exe)),
    );
    fields.insert("calldata".to_string(), Value::String(calldata));
    fields.insert("timeout".to_string(), Value::from(timeout));

    let request = request::validate_fields(&fields, &config.limits)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let executor = config.executor();
    Ok(executor.run(request).await)
}

pub async fn run(args: RunArgs, config: &GlobalConfig) -> Result<()> {
    let result = execute_local(&args, config).await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);

    exit(result.returncode);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(exe: &std::path::Path, calldata: Option<&str>, timeout: Option<u64>) -> RunArgs {
        RunArgs {
            calldata: calldata.map(str::to_string),
            timeout,
            pretty: false,
            exe: exe.to_string_lossy().into_owned(),
        }
    }

    fn config(dir: &std::path::Path) -> GlobalConfig {
        GlobalConfig {
            work_dir: Some(dir.to_path_buf()),
            ..GlobalConfig::default()
        }
    }

    #[tokio::test]
    async fn test_execute_local_with_calldata() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("echo.sh");
        std::fs::write(&exe, "#!/bin/sh\ncat\n").unwrap();

        let result = execute_local(&args(&exe, Some("bitcoin"), Some(1000)), &config(dir.path()))
            .await
            .unwrap();
        assert_eq!(result.returncode, 0);
        assert_eq!(result.stdout, "bitcoin");
    }

    #[tokio::test]
    async fn test_execute_local_calldata_file() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("echo.sh");
        std::fs::write(&exe, "#!/bin/sh\ncat\n").unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, "from file").unwrap();

        let calldata = format!("@{}", input.display());
        let result = execute_local(&args(&exe, Some(&calldata), None), &config(dir.path()))
            .await
            .unwrap();
        assert_eq!(result.stdout, "from file");
    }

    #[tokio::test]
    async fn test_execute_local_rejects_timeout_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("noop.sh");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();

        let err = execute_local(&args(&exe, Some(""), Some(10_000)), &config(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Runtime exceeded max size");
    }

    #[tokio::test]
    async fn test_execute_local_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.sh");
        assert!(execute_local(&args(&missing, Some(""), None), &config(dir.path())).await.is_err());
    }
}
