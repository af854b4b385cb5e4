//! Violation reports and aggregated validation results.

use serde::{Deserialize, Serialize};

use crate::policy::{Authority, RuleSeverity};

/// A single rule match against a proposed path.
///
/// Created once during evaluation and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Name of the rule that matched.
    pub rule_name: String,
    /// Path that triggered the match.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Severity as declared (forced to blocking for hard invariants).
    pub severity: RuleSeverity,
    /// Authority tier of the matching rule.
    pub authority: Authority,
    /// Whether this match blocks the transaction.
    pub blocking: bool,
    /// Suggested remediation, if the rule declares one.
    pub suggested_fix: Option<String>,
    /// Policy that owns the matching rule.
    pub source_policy: String,
}

/// Aggregated result of evaluating a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Every match, blocking or advisory.
    pub violations: Vec<ViolationReport>,
}

impl ValidationResult {
    /// Build a result; validity is derived from the blocking flags.
    pub fn from_violations(violations: Vec<ViolationReport>) -> Self {
        let is_valid = !violations.iter().any(|v| v.blocking);
        Self {
            is_valid,
            violations,
        }
    }

    /// Matches that block the transaction.
    pub fn blocking(&self) -> impl Iterator<Item = &ViolationReport> {
        self.violations.iter().filter(|v| v.blocking)
    }

    /// Matches that are recorded but do not block.
    pub fn advisory(&self) -> impl Iterator<Item = &ViolationReport> {
        self.violations.iter().filter(|v| !v.blocking)
    }

    /// Whether the hard invariant fired for any path.
    pub fn hard_invariant_fired(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.authority == Authority::HardInvariant)
    }
}
