//! The audit pipeline seam.
//!
//! The canary does not know what "validation" means for a repository;
//! it hands the sandbox root to an [`AuditPipeline`] and classifies the
//! findings that come back.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use charter_types::{AuditFinding, Finding};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{CanaryError, SandboxResult};

/// Check id of the finding added when the audit command exits non-zero.
pub const AUDIT_COMMAND_FAILED: &str = "audit.command_failed";

/// Runs the full validation suite rooted at a directory.
#[async_trait]
pub trait AuditPipeline: Send + Sync {
    fn name(&self) -> &str;

    async fn audit(&self, root: &Path) -> SandboxResult<Vec<AuditFinding>>;
}

// ── Static Pipeline ─────────────────────────────────────────────────────

/// Returns a fixed set of findings. For tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct StaticAuditPipeline {
    findings: Vec<AuditFinding>,
    delay: Option<Duration>,
}

impl StaticAuditPipeline {
    /// A pipeline with no findings.
    pub fn passing() -> Self {
        Self::default()
    }

    /// A pipeline reporting one blocking finding.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::default().with_finding(Finding::error("static", message))
    }

    pub fn with_finding(mut self, finding: impl Into<AuditFinding>) -> Self {
        self.findings.push(finding.into());
        self
    }

    /// Sleep before reporting, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AuditPipeline for StaticAuditPipeline {
    fn name(&self) -> &str {
        "static"
    }

    async fn audit(&self, _root: &Path) -> SandboxResult<Vec<AuditFinding>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.findings.clone())
    }
}

// ── Command Pipeline ────────────────────────────────────────────────────

/// Runs an external audit command inside the sandbox.
///
/// Every stdout line that is a JSON object is read as one finding; other
/// lines are ignored. A non-zero exit always adds one blocking finding,
/// whatever else was printed. The child is killed if the future is dropped.
#[derive(Clone, Debug)]
pub struct CommandAuditPipeline {
    program: String,
    args: Vec<String>,
}

impl CommandAuditPipeline {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a whitespace-separated command line. No shell is involved.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }
}

#[async_trait]
impl AuditPipeline for CommandAuditPipeline {
    fn name(&self) -> &str {
        &self.program
    }

    async fn audit(&self, root: &Path) -> SandboxResult<Vec<AuditFinding>> {
        debug!(program = %self.program, root = %root.display(), "running audit command");
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CanaryError::Pipeline(format!("failed to spawn {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut findings = parse_findings(&stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let detail = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
            warn!(
                program = %self.program,
                status = %output.status,
                findings = findings.len(),
                "audit command failed"
            );
            findings.push(
                Finding::error(
                    AUDIT_COMMAND_FAILED,
                    format!("{} exited with {}: {}", self.program, output.status, detail),
                )
                .into(),
            );
        }
        Ok(findings)
    }
}

/// Parse JSON-lines findings, skipping anything that is not an object.
pub fn parse_findings(output: &str) -> Vec<AuditFinding> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .filter_map(|l| match serde_json::from_str::<AuditFinding>(l) {
            Ok(f) => Some(f),
            Err(e) => {
                debug!(error = %e, "ignoring unparseable audit line");
                None
            }
        })
        .collect()
}
