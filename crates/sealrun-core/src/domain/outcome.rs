//! Outcome model: what one run reports back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, SidecarError};
use super::ids::RunId;

/// Summary of one run.
///
/// `process_error` holds the orchestration failure (any stage), while
/// `execution_error` holds whatever the worker wrote to stderr. Nonempty
/// stderr alone does not make a run fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub run_id: RunId,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
    /// Output ids that were re-encrypted and registered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registered_outputs: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    pub fn started(run_id: RunId) -> Self {
        Self {
            run_id,
            succeeded: true,
            process_error: None,
            execution_error: None,
            registered_outputs: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// The single failure message combining both error sources.
    pub fn merged_error(&self) -> String {
        format!(
            "task process error: {}\n task execution error: {}",
            self.process_error.as_deref().unwrap_or_default(),
            self.execution_error.as_deref().unwrap_or_default()
        )
    }
}

/// A failed run: the first fatal error plus the result recorded so far.
#[derive(Debug)]
pub struct TaskFailure {
    pub cause: SidecarError,
    pub result: TaskResult,
}

impl TaskFailure {
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.result.merged_error())
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
