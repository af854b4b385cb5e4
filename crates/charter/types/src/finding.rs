//! Check findings.
//!
//! [`Finding`] is the typed output of enforcement strategies. Audit
//! pipelines are looser: they may report typed findings, a bare
//! severity label, or an arbitrary JSON map. [`AuditFinding`] accepts all
//! three and [`AuditFinding::is_blocking`] classifies them uniformly.

use serde::{Deserialize, Serialize};

/// Severity of a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A typed finding produced by a check or strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Check that produced the finding (e.g. `policy.missing`).
    pub check_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub severity: FindingSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Explicit blocking override; when absent, `Error` severity blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_blocking: Option<bool>,
}

impl Finding {
    pub fn new(
        check_id: impl Into<String>,
        severity: FindingSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            rule_id: None,
            severity,
            message: message.into(),
            file_path: None,
            is_blocking: None,
        }
    }

    pub fn error(check_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_id, FindingSeverity::Error, message)
    }

    pub fn warning(check_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_id, FindingSeverity::Warning, message)
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.is_blocking = Some(blocking);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.is_blocking
            .unwrap_or(self.severity == FindingSeverity::Error)
    }
}

/// A finding as reported by an audit pipeline, in any of its shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditFinding {
    /// Fully typed finding.
    Typed(Finding),
    /// Severity label plus message, compared as a string.
    Labeled { severity: String, message: String },
    /// Anything else a pipeline emits.
    Raw(serde_json::Value),
}

impl AuditFinding {
    /// Whether this finding resolves to a blocking (`error`) severity.
    pub fn is_blocking(&self) -> bool {
        match self {
            Self::Typed(finding) => finding.is_blocking(),
            Self::Labeled { severity, .. } => severity_label_blocks(severity),
            Self::Raw(value) => {
                if let Some(flag) = value.get("is_blocking").and_then(|v| v.as_bool()) {
                    return flag;
                }
                value
                    .get("severity")
                    .and_then(|v| v.as_str())
                    .map(severity_label_blocks)
                    .unwrap_or(false)
            }
        }
    }

    /// Short human-readable summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Typed(f) => format!("[{}] {}: {}", f.severity, f.check_id, f.message),
            Self::Labeled { severity, message } => format!("[{severity}] {message}"),
            Self::Raw(value) => value.to_string(),
        }
    }
}

impl From<Finding> for AuditFinding {
    fn from(finding: Finding) -> Self {
        Self::Typed(finding)
    }
}

fn severity_label_blocks(label: &str) -> bool {
    label.trim().eq_ignore_ascii_case("error")
}
