// Type definitions and error taxonomy

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Errors raised anywhere in the upload pipeline.
///
/// Every variant is fatal to the invocation; the binary logs it and exits
/// non-zero. "Object already exists" is deliberately not an error, see
/// [`UploadOutcome::Skipped`].
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key parse error: {0}")]
    KeyParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Region resolution error: {0}")]
    RegionResolution(String),
}

impl AppError {
    /// Wrap an IO error with the path it concerns.
    pub fn io_at(path: impl Into<PathBuf>, e: std::io::Error) -> Self {
        let path = path.into();
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Where a single upload is headed and how fast it may go.
///
/// `content_length` is fixed from the artifact size before the transfer
/// starts; presigned PUTs reject bodies of unknown length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub bucket: String,
    pub key: String,
    pub content_length: u64,
    pub bytes_per_second: u64,
}

/// Result of one pipeline run that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// An object was already present at the destination key.
    Skipped,
    /// The endpoint accepted the body.
    Uploaded { bytes: u64, elapsed: Duration },
    /// The endpoint answered with a non-success status.
    Failed { status: u16 },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, UploadOutcome::Failed { .. })
    }

    /// Achieved throughput in KB/s, only meaningful for `Uploaded`.
    pub fn kbps(&self) -> Option<f64> {
        match self {
            UploadOutcome::Uploaded { bytes, elapsed } => {
                let secs = elapsed.as_secs_f64();
                if secs > 0.0 {
                    Some(*bytes as f64 / 1024.0 / secs)
                } else {
                    Some(f64::INFINITY)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Skipped => write!(f, "skipped"),
            UploadOutcome::Uploaded { .. } => write!(f, "uploaded"),
            UploadOutcome::Failed { status } => write!(f, "failed (HTTP {})", status),
        }
    }
}
