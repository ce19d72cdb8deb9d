//! Error taxonomy for repository checks.

use std::fmt;

use repocheck_state::{CheckState, StorageError};

use super::lifecycle::CheckEvent;

/// The git sub-command that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOperation {
    Clone,
    Checkout,
    Fetch,
    RevParse,
}

impl GitOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitOperation::Clone => "clone",
            GitOperation::Checkout => "checkout",
            GitOperation::Fetch => "fetch",
            GitOperation::RevParse => "rev-parse",
        }
    }
}

impl fmt::Display for GitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while requesting or performing a check.
///
/// Everything except [`CheckError::RepositoryNotFound`] and
/// [`CheckError::Storage`] is caught inside `perform` and recorded on the
/// check as its `error` text, so the `Display` output is what users see.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("{analyzer} configuration not found at {path}")]
    ConfigurationMissing { analyzer: String, path: String },

    #[error("Repository URL is missing for {repository}")]
    SourceUnavailable { repository: String },

    #[error("{}", git_failure_message(.operation, *.exit_code, .output))]
    GitOperationFailed {
        operation: GitOperation,
        exit_code: i32,
        output: String,
    },

    #[error("{message}")]
    AnalyzerRuntimeMissing { runtime: String, message: String },

    #[error("cannot {event} a check that is {from}")]
    InvalidTransition { from: CheckState, event: CheckEvent },

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("repository host error: {0}")]
    Host(String),

    #[error("failed to start {program}: {source}")]
    ProcessStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The captured output as-is; only blank output falls back to a summary.
fn git_failure_message(operation: &GitOperation, exit_code: i32, output: &str) -> String {
    if output.trim().is_empty() {
        format!("git {operation} exited with status {exit_code}")
    } else {
        output.to_string()
    }
}

impl CheckError {
    /// True for lookup failures that callers report as "no such repository".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CheckError::RepositoryNotFound(_)
                | CheckError::Storage(StorageError::RepositoryNotFound { .. })
        )
    }
}

/// Result type for check operations.
pub type CheckResult<T> = std::result::Result<T, CheckError>;
