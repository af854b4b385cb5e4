//! Error types for policy loading and compilation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the policy store.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy directory does not exist.
    #[error("policy store not found: {0}")]
    StoreNotFound(PathBuf),

    /// A policy document could not be read.
    #[error("failed to read policy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A policy document is not valid YAML or has the wrong shape.
    #[error("failed to parse policy {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Two documents declare the same policy id.
    #[error("duplicate policy id: {0}")]
    DuplicatePolicy(String),
}

/// Convenience result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
