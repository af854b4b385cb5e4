//! Error types for proposal storage and approval.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the proposal store, key handling and configuration.
///
/// Signature problems are deliberately absent: stale or invalid
/// signatures reduce the valid count, they are not errors.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No proposal with this name exists.
    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    /// A key or configuration file is missing.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Key material could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Another process holds the proposal lock.
    #[error("proposal {name} is locked by another operation ({lock})")]
    Locked { name: String, lock: PathBuf },

    /// Proposal name does not follow the `cr-*` convention.
    #[error("invalid proposal name: {0}")]
    InvalidName(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize proposal: {0}")]
    Serialize(String),
}

impl ApprovalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
