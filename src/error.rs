//! Error types for the build hook.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt build record for {commit}: {reason}")]
    CorruptRecord { commit: String, reason: String },

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
}

/// Errors raised by a merge oracle
#[derive(Debug, Error)]
pub enum OracleError {
    /// The branch name does not name any commit.
    #[error("Branch not found: {0}")]
    NotFound(String),

    /// The branch name is malformed.
    #[error("Invalid branch name: {0:?}")]
    Invalid(String),

    #[error("git command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected git output: {0}")]
    UnexpectedOutput(String),

    #[error("git I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OracleError {
    /// Lookup failures mean "nothing to build" rather than a fault.
    pub fn is_unresolvable(&self) -> bool {
        matches!(self, OracleError::NotFound(_) | OracleError::Invalid(_))
    }
}

/// Service-level errors surfaced to callers of the hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Merge oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid build status code: {0}")]
    InvalidStatus(i64),

    #[error("Ticket not found: #{0}")]
    TicketNotFound(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for HookError {
    fn from(err: config::ConfigError) -> Self {
        HookError::ConfigError(err.to_string())
    }
}
