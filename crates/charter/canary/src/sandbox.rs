//! Canary sandbox.
//!
//! A proposal is validated against a throwaway copy of the repository:
//!
//! ```text
//!   repo/ ──copy (minus VCS, venvs, build output)──▶ <sandbox_root>/<proposal>/
//!                                                        │
//!                              write proposal content ◀──┤
//!                              run audit pipeline     ◀──┘
//! ```
//!
//! All writes land below the sandbox directory. A passing or cancelled
//! run removes the sandbox; a failing run keeps it for postmortem. The
//! next attempt for the same proposal always starts from a clean copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use charter_policy::path::{normalize, NormalizedPath};
use charter_types::{AuditFinding, Proposal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{CanaryError, SandboxResult};
use crate::pipeline::AuditPipeline;

/// Directory names never copied into a sandbox.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "env",
    "node_modules",
    "target",
    "build",
    "dist",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
];

/// Outcome of one canary run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanaryResult {
    /// True when no finding is blocking.
    pub passed: bool,
    pub findings: Vec<AuditFinding>,
    /// Where the run happened. Only still on disk when `passed` is false.
    pub sandbox_path: PathBuf,
}

impl CanaryResult {
    pub fn blocking(&self) -> impl Iterator<Item = &AuditFinding> {
        self.findings.iter().filter(|f| f.is_blocking())
    }
}

// ── Guard ───────────────────────────────────────────────────────────────

/// Removes the sandbox directory on drop unless told to keep it.
#[derive(Debug)]
pub struct SandboxGuard {
    path: PathBuf,
    keep: bool,
}

impl SandboxGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep: false,
        }
    }

    /// Leave the directory in place when the guard drops.
    pub fn keep(&mut self) {
        self.keep = true;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        if self.keep {
            info!(sandbox = %self.path.display(), "sandbox kept for inspection");
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(sandbox = %self.path.display(), "sandbox removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(sandbox = %self.path.display(), error = %e, "failed to remove sandbox"),
        }
    }
}

// ── Sandbox ─────────────────────────────────────────────────────────────

/// Validates proposals in isolated repository copies.
#[derive(Clone)]
pub struct CanarySandbox {
    sandbox_root: PathBuf,
    pipeline: Arc<dyn AuditPipeline>,
    excludes: Vec<String>,
}

impl std::fmt::Debug for CanarySandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanarySandbox")
            .field("sandbox_root", &self.sandbox_root)
            .field("pipeline", &self.pipeline.name())
            .field("excludes", &self.excludes)
            .finish()
    }
}

impl CanarySandbox {
    pub fn new(sandbox_root: impl Into<PathBuf>, pipeline: Arc<dyn AuditPipeline>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            pipeline,
            excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the excluded directory names.
    pub fn with_excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Sandbox directory used for `proposal_name`.
    pub fn sandbox_path_for(&self, proposal_name: &str) -> PathBuf {
        self.sandbox_root.join(proposal_name)
    }

    /// Copy the repository, apply the proposal inside the copy and audit it.
    pub async fn run(&self, repo_root: &Path, proposal: &Proposal) -> SandboxResult<CanaryResult> {
        let target = proposal
            .target_path
            .as_deref()
            .ok_or_else(|| CanaryError::MissingTarget(proposal.name.clone()))?;
        let relative = match normalize(Path::new(target), Some(repo_root)) {
            NormalizedPath::Relative(p) if !p.is_empty() => p,
            _ => return Err(CanaryError::TargetEscapesSandbox(target.to_string())),
        };

        let sandbox = self.sandbox_path_for(&proposal.name);
        // Armed before the copy starts so a cancelled run cleans up.
        let mut guard = SandboxGuard::new(&sandbox);

        let copied = {
            let repo_root = repo_root.to_path_buf();
            let sandbox_root = self.sandbox_root.clone();
            let sandbox = sandbox.clone();
            let excludes = self.excludes.clone();
            tokio::task::spawn_blocking(move || {
                prepare_sandbox(&repo_root, &sandbox_root, &sandbox, &excludes)
            })
            .await
            .map_err(|e| CanaryError::Copy(e.to_string()))??
        };
        debug!(proposal = %proposal.name, files = copied, "repository copied into sandbox");

        let dest = sandbox.join(&relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CanaryError::io(parent, e))?;
        }
        tokio::fs::write(&dest, proposal.content.as_bytes())
            .await
            .map_err(|e| CanaryError::io(&dest, e))?;

        let findings = match self.pipeline.audit(&sandbox).await {
            Ok(findings) => findings,
            Err(e) => {
                guard.keep();
                return Err(e);
            }
        };

        let passed = !findings.iter().any(AuditFinding::is_blocking);
        if passed {
            info!(proposal = %proposal.name, findings = findings.len(), "canary passed");
        } else {
            guard.keep();
            warn!(
                proposal = %proposal.name,
                blocking = findings.iter().filter(|f| f.is_blocking()).count(),
                sandbox = %sandbox.display(),
                "canary failed"
            );
        }

        Ok(CanaryResult {
            passed,
            findings,
            sandbox_path: sandbox,
        })
    }
}

/// Clear `sandbox` and fill it with a filtered copy of `repo_root`.
fn prepare_sandbox(
    repo_root: &Path,
    sandbox_root: &Path,
    sandbox: &Path,
    excludes: &[String],
) -> SandboxResult<u64> {
    if sandbox.exists() {
        debug!(sandbox = %sandbox.display(), "removing stale sandbox");
        fs::remove_dir_all(sandbox).map_err(|e| CanaryError::io(sandbox, e))?;
    }
    fs::create_dir_all(sandbox).map_err(|e| CanaryError::io(sandbox, e))?;

    // Canonical forms so a sandbox root inside the repository is skipped.
    let repo_root = repo_root
        .canonicalize()
        .map_err(|e| CanaryError::io(repo_root, e))?;
    let sandbox_root = sandbox_root
        .canonicalize()
        .map_err(|e| CanaryError::io(sandbox_root, e))?;

    copy_tree(&repo_root, sandbox, &sandbox_root, excludes)
}

fn copy_tree(src: &Path, dst: &Path, skip: &Path, excludes: &[String]) -> SandboxResult<u64> {
    let mut files = 0;
    let walker = WalkDir::new(src).into_iter().filter_entry(|e| {
        if e.depth() == 0 {
            return true;
        }
        if e.path().starts_with(skip) {
            return false;
        }
        !(e.file_type().is_dir()
            && e.file_name()
                .to_str()
                .map(|n| excludes.iter().any(|x| x == n))
                .unwrap_or(false))
    });

    for entry in walker {
        let entry = entry.map_err(|e| CanaryError::Copy(e.to_string()))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let out = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&out).map_err(|e| CanaryError::io(&out, e))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &out).map_err(|e| CanaryError::io(&out, e))?;
            files += 1;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular file");
        }
    }
    Ok(files)
}
