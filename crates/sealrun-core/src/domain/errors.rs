//! Errors - エラー型と分類
//!
//! Every stage of the sidecar fails fast with a `SidecarError`. Nothing in the
//! core retries; the caller decides whether to launch a fresh run.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// ErrorKind は `SidecarError` の平坦な分類
///
/// Payload を持たないので、テストやログで category だけを比較できる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Integrity,
    InvalidKeySize,
    Precondition,
    Transport,
    Service,
    MissingKey,
    Launch,
    Failure,
    Schema,
    Unsupported,
    Io,
    Crypto,
}

/// How a worker process ended when it did not exit cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDetail {
    /// Exited on its own with a nonzero status.
    ExitCode(i32),

    /// Killed by a signal.
    Signal(i32),

    /// Waiting on the child failed for a reason other than an interrupted wait.
    Os(String),
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDetail::ExitCode(code) => write!(f, "task failed with status code {code}"),
            FailureDetail::Signal(sig) => write!(f, "task killed by signal {sig}"),
            FailureDetail::Os(msg) => write!(f, "waiting on task failed: {msg}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SidecarError {
    /// Malformed on-disk or wire structure.
    #[error("format error: {0}")]
    Format(String),

    /// AEAD tag mismatch or a MAC/signature that does not verify.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("invalid data key size: got {0} bytes, expected 16 or 32")]
    InvalidKeySize(usize),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("transport error calling {method}: {message}")]
    Transport { method: String, message: String },

    #[error("service returned code {code}: {message}")]
    Service { code: i32, message: String },

    #[error("no data key for input `{0}`")]
    MissingKey(String),

    #[error("failed to launch `{program}`: {message}")]
    Launch { program: String, message: String },

    #[error("{0}")]
    Failure(FailureDetail),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SidecarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SidecarError::Format(_) => ErrorKind::Format,
            SidecarError::Integrity(_) => ErrorKind::Integrity,
            SidecarError::InvalidKeySize(_) => ErrorKind::InvalidKeySize,
            SidecarError::Precondition(_) => ErrorKind::Precondition,
            SidecarError::Transport { .. } => ErrorKind::Transport,
            SidecarError::Service { .. } => ErrorKind::Service,
            SidecarError::MissingKey(_) => ErrorKind::MissingKey,
            SidecarError::Launch { .. } => ErrorKind::Launch,
            SidecarError::Failure(_) => ErrorKind::Failure,
            SidecarError::Schema(_) => ErrorKind::Schema,
            SidecarError::Unsupported(_) => ErrorKind::Unsupported,
            SidecarError::Io { .. } => ErrorKind::Io,
            SidecarError::Crypto(_) => ErrorKind::Crypto,
        }
    }

    /// Wrap an `io::Error` together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SidecarError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        SidecarError::Format(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        SidecarError::Schema(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        SidecarError::Unsupported(message.into())
    }

    pub fn crypto(message: impl fmt::Display) -> Self {
        SidecarError::Crypto(message.to_string())
    }
}

impl From<serde_json::Error> for SidecarError {
    fn from(e: serde_json::Error) -> Self {
        SidecarError::Format(format!("json: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, SidecarError>;
