use std::path::PathBuf;

/// Errors from the canary sandbox.
///
/// A run that completes with blocking findings is not an error; it is a
/// [`CanaryResult`](crate::CanaryResult) with `passed == false`.
#[derive(Debug, thiserror::Error)]
pub enum CanaryError {
    #[error("proposal {0} has no target path")]
    MissingTarget(String),
    #[error("target path escapes the sandbox: {0}")]
    TargetEscapesSandbox(String),
    #[error("sandbox io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("repository copy failed: {0}")]
    Copy(String),
    #[error("audit pipeline failed: {0}")]
    Pipeline(String),
}

impl CanaryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type SandboxResult<T> = Result<T, CanaryError>;
