//! Payload decoding and materialization of runnable artifacts.
//!
//! The executable arrives base64-encoded. It is decoded, written to a fresh
//! file in the work directory, marked executable and closed before launch.
//! The file is removed when the [`RunnableArtifact`] is dropped.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use base64::Engine;
use tempfile::TempPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("executable is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
    #[error("executable decoded to zero bytes")]
    Empty,
    #[error("failed to materialize executable: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode the transport encoding of an executable payload.
pub fn decode_executable(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(bytes)
}

/// Calldata is carried as text and handed to the child verbatim.
pub fn decode_calldata(calldata: &str) -> Vec<u8> {
    calldata.as_bytes().to_vec()
}

/// An executable file owned by one execution.
#[derive(Debug)]
pub struct RunnableArtifact {
    path: TempPath,
}

impl RunnableArtifact {
    /// Write `bytes` to a new mode-0700 file under `dir`.
    ///
    /// The write handle is closed before returning; executing a file that is
    /// still open for writing fails with ETXTBSY.
    pub fn create(dir: &Path, bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut file = tempfile::Builder::new()
            .prefix("execbox-")
            .permissions(std::fs::Permissions::from_mode(0o700))
            .tempfile_in(dir)?;
        file.write_all(bytes)?;

        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, reporting failure instead of swallowing it.
    pub fn remove(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Default directory for artifacts when none is configured
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}
