//! Policy rule model.
//!
//! Defines the three authority tiers, rule severities and the compiled
//! [`PolicyRule`] produced by the policy compiler.

use serde::{Deserialize, Serialize};

// ── Authority ───────────────────────────────────────────────────────────

/// Authority tier of a rule.
///
/// Determines whether a rule match can ever be relaxed by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    /// Non-configurable. Always blocks.
    HardInvariant,
    /// Constitutional rule. Always blocks.
    Constitutional,
    /// Ordinary policy. Blocks only in strict mode when the rule is blocking.
    Policy,
}

impl Authority {
    /// Whether a match at this tier blocks regardless of engine mode.
    pub fn always_blocks(&self) -> bool {
        matches!(self, Self::HardInvariant | Self::Constitutional)
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardInvariant => write!(f, "hard_invariant"),
            Self::Constitutional => write!(f, "constitutional"),
            Self::Policy => write!(f, "policy"),
        }
    }
}

// ── Severity ────────────────────────────────────────────────────────────

/// Declared severity of a rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    #[default]
    Blocking,
    Advisory,
}

impl std::fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Advisory => write!(f, "advisory"),
        }
    }
}

// ── Impact ──────────────────────────────────────────────────────────────

/// What kind of write a transaction performs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    /// Source or behavioural change.
    #[default]
    Code,
    /// Only metadata is touched. Static-analysis rules do not gate these.
    MetadataOnly,
}

// ── Compiled Rule ───────────────────────────────────────────────────────

/// A compiled, immutable policy rule.
///
/// Rules are totally ordered by `(precedence_rank, declaration_index)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Rule identifier, unique within its policy.
    pub id: String,
    /// Glob pattern over repository-relative paths.
    pub path_pattern: String,
    /// Authority tier.
    pub authority: Authority,
    /// Declared severity.
    pub severity: RuleSeverity,
    /// Policy that declared this rule.
    pub owning_policy_id: String,
    /// Position of the owning policy in the precedence map (lower = earlier).
    pub precedence_rank: usize,
    /// Order in which the rule was declared across the whole store.
    pub declaration_index: usize,
    /// Verification engine named by the rule, if any.
    pub engine: Option<String>,
    /// Whether the engine is a pure static-analysis engine.
    pub static_analysis: bool,
    /// Human-readable message reported on a match.
    pub message: Option<String>,
    /// Suggested remediation reported on a match.
    pub suggested_fix: Option<String>,
}

impl PolicyRule {
    /// Ordering key used by the compiler.
    pub fn order_key(&self) -> (usize, usize) {
        (self.precedence_rank, self.declaration_index)
    }

    /// Whether a match of this rule blocks under the given engine mode.
    pub fn blocks(&self, strict_mode: bool) -> bool {
        self.authority.always_blocks()
            || (strict_mode && self.severity == RuleSeverity::Blocking)
    }
}
