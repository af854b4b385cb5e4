//! Error types for the proposal lifecycle.

use std::path::PathBuf;
use std::time::Duration;

use charter_approval::ApprovalError;
use charter_canary::CanaryError;
use charter_policy::PolicyError;
use charter_types::{AuditFinding, ViolationReport};
use thiserror::Error;

/// Errors from the rollback archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode rollback record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt rollback record at {path}:{line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors loading the engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Errors from the non-approve lifecycle operations and engine assembly.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Why an `approve` call stopped.
///
/// Each variant is terminal for the call: nothing is retried, and no
/// variant after `QuorumNotMet` can occur without quorum having been met.
#[derive(Debug, Error)]
pub enum ApproveError {
    #[error("proposal not found: {0}")]
    NotFound(String),

    #[error("proposal {name} is invalid: {reason}")]
    InvalidProposal { name: String, reason: String },

    #[error("proposal {name} is blocked by {} policy violation(s)", .violations.len())]
    PolicyViolation {
        name: String,
        violations: Vec<ViolationReport>,
    },

    #[error("proposal {name} has {valid} valid signature(s), {required} required")]
    QuorumNotMet { name: String, valid: u32, required: u32 },

    #[error("canary failed for {name} with {} blocking finding(s); sandbox kept at {}", blocking_count(.findings), .sandbox_path.display())]
    CanaryFailed {
        name: String,
        findings: Vec<AuditFinding>,
        sandbox_path: PathBuf,
    },

    #[error("canary for {name} timed out after {timeout:?}")]
    CanaryTimedOut { name: String, timeout: Duration },

    #[error("canary for {name} could not run: {source}")]
    CanaryAborted {
        name: String,
        #[source]
        source: CanaryError,
    },

    #[error("failed to read live file {} before archiving, change not applied: {source}", .path.display())]
    LiveReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rollback archive failed, change not applied: {0}")]
    ArchiveFailed(#[source] ArchiveError),

    #[error("failed to apply change to {path}: {source}")]
    ApplyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("proposal {0} is locked by another operation")]
    Locked(String),

    #[error(transparent)]
    Store(ApprovalError),
}

fn blocking_count(findings: &[AuditFinding]) -> usize {
    findings.iter().filter(|f| f.is_blocking()).count()
}

impl From<ApprovalError> for ApproveError {
    fn from(e: ApprovalError) -> Self {
        match e {
            ApprovalError::ProposalNotFound(name) => Self::NotFound(name),
            ApprovalError::Locked { name, .. } => Self::Locked(name),
            ApprovalError::InvalidName(name) => Self::InvalidProposal {
                name,
                reason: "name must look like cr-<id>".into(),
            },
            other => Self::Store(other),
        }
    }
}
