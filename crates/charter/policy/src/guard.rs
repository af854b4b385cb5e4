//! Intent guard: tiered evaluation of proposed paths.
//!
//! For each proposed path:
//!
//! 1. **Hard invariant**: anything under the constitutional-intent root
//!    (default `.intent`) or under one of the engine's own state roots is
//!    an automatic blocking violation. Not configurable; strict mode,
//!    rules and impact tags have no effect.
//! 2. **Rule matching**: every compiled rule whose glob matches yields a
//!    report. `hard_invariant` and `constitutional` authorities block;
//!    `policy` authority blocks only in strict mode when the rule is
//!    blocking. Everything else is advisory.
//!
//! All matches are returned so advisory violations stay visible.
//!
//! [`IntentGuard::evaluate`] is lexical. Right before a write,
//! [`IntentGuard::check_resolved`] repeats the hard invariant against the
//! filesystem so symlinked directories cannot redirect a target.

use std::path::{Path, PathBuf};

use charter_types::{
    Authority, Impact, PolicyRule, RuleSeverity, ValidationResult, ViolationReport,
};
use globset::{Glob, GlobMatcher};
use tracing::{debug, warn};

use crate::path::{canonical_relative, is_under, normalize, resolve_on_disk, NormalizedPath, OnDisk};

/// Name reported for hard-invariant violations.
pub const HARD_INVARIANT_RULE: &str = "intent.hard_invariant";
const HARD_INVARIANT_POLICY: &str = "constitution";

/// Default constitutional-intent root.
pub const DEFAULT_INTENT_ROOT: &str = ".intent";

// ── Config ──────────────────────────────────────────────────────────────

/// Configuration for the intent guard.
#[derive(Clone, Debug)]
pub struct GuardConfig {
    /// Constitutional-intent root, relative to the repository.
    pub intent_root: PathBuf,
    /// Repository root used to relativise absolute paths.
    pub repo_root: Option<PathBuf>,
    /// Escalate blocking policy-tier rules to enforced.
    pub strict_mode: bool,
    /// Engine state (proposals, approvers, archive, ...) that proposals
    /// may never target. Relative to the repository.
    pub protected_roots: Vec<PathBuf>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            intent_root: PathBuf::from(DEFAULT_INTENT_ROOT),
            repo_root: None,
            strict_mode: false,
            protected_roots: Vec::new(),
        }
    }
}

// ── Guard ───────────────────────────────────────────────────────────────

struct CompiledRule {
    rule: PolicyRule,
    matcher: GlobMatcher,
}

/// Evaluates proposed transactions against compiled policy rules.
pub struct IntentGuard {
    rules: Vec<CompiledRule>,
    intent_root: String,
    protected_roots: Vec<String>,
    repo_root: Option<PathBuf>,
    strict_mode: bool,
}

impl IntentGuard {
    /// Build a guard from compiled rules.
    ///
    /// Rules with malformed glob patterns are skipped with a warning; they
    /// never match and never fail the guard.
    pub fn new(rules: Vec<PolicyRule>, config: GuardConfig) -> Self {
        let compiled = rules
            .into_iter()
            .filter_map(|rule| match Glob::new(&rule.path_pattern) {
                Ok(glob) => Some(CompiledRule {
                    matcher: glob.compile_matcher(),
                    rule,
                }),
                Err(e) => {
                    warn!(
                        rule = %rule.id,
                        pattern = %rule.path_pattern,
                        error = %e,
                        "skipping rule with malformed glob"
                    );
                    None
                }
            })
            .collect();

        let intent_root = normalize(&config.intent_root, config.repo_root.as_deref())
            .as_str()
            .to_string();
        let protected_roots = config
            .protected_roots
            .iter()
            .filter_map(|root| match normalize(root, config.repo_root.as_deref()) {
                NormalizedPath::Relative(p) if !p.is_empty() => Some(p),
                _ => None,
            })
            .collect();

        Self {
            rules: compiled,
            intent_root,
            protected_roots,
            repo_root: config.repo_root,
            strict_mode: config.strict_mode,
        }
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Number of rules with valid patterns.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate a transaction touching `proposed_paths`.
    pub fn evaluate<P: AsRef<Path>>(
        &self,
        proposed_paths: &[P],
        impact: Option<Impact>,
    ) -> ValidationResult {
        let impact = impact.unwrap_or_default();
        let mut violations = Vec::new();

        for raw in proposed_paths {
            let raw = raw.as_ref();
            let normalized = normalize(raw, self.repo_root.as_deref());

            if let Some(report) = self.check_hard_invariant(raw, &normalized) {
                violations.push(report);
                continue;
            }

            let path = normalized.as_str();
            for compiled in &self.rules {
                let rule = &compiled.rule;
                if impact == Impact::MetadataOnly && rule.static_analysis {
                    continue;
                }
                if !compiled.matcher.is_match(path) {
                    continue;
                }
                violations.push(self.report_for(rule, path));
            }
        }

        let result = ValidationResult::from_violations(violations);
        debug!(
            paths = proposed_paths.len(),
            violations = result.violations.len(),
            valid = result.is_valid,
            "intent guard evaluated transaction"
        );
        result
    }

    fn check_hard_invariant(
        &self,
        raw: &Path,
        normalized: &NormalizedPath,
    ) -> Option<ViolationReport> {
        let message = match normalized {
            NormalizedPath::Escapes(p) => {
                format!("path '{p}' resolves outside the repository")
            }
            NormalizedPath::Relative(p) => self.protected_root_message(p)?,
        };

        warn!(path = %raw.display(), "hard invariant violation");
        Some(hard_invariant_report(normalized.as_str(), message))
    }

    /// Why the relative path `p` is protected, if it is.
    fn protected_root_message(&self, p: &str) -> Option<String> {
        if is_under(p, &self.intent_root) {
            return Some(format!(
                "path '{p}' is under the constitutional intent root '{}'",
                self.intent_root
            ));
        }
        self.protected_roots
            .iter()
            .find(|root| is_under(p, root))
            .map(|root| format!("path '{p}' is governance engine state under '{root}'"))
    }

    /// Repeat the hard invariant for `target` against the filesystem.
    ///
    /// Blocks when an existing component of the target below the
    /// repository root is a symlink, when its deepest existing ancestor
    /// resolves outside the repository, or when it lies under the resolved
    /// location of the intent root or a protected root. Guards built
    /// without a repository root have nothing to resolve against and
    /// return `None`.
    pub fn check_resolved(&self, target: &str) -> Option<ViolationReport> {
        let repo_root = self.repo_root.as_deref()?;
        let normalized = normalize(Path::new(target), Some(repo_root));
        if let Some(report) = self.check_hard_invariant(Path::new(target), &normalized) {
            return Some(report);
        }
        let rel = normalized.as_str();

        let message = match resolve_on_disk(repo_root, rel) {
            Err(e) => format!("path '{rel}' could not be resolved: {e}"),
            Ok(OnDisk::Symlink(link)) => {
                format!("path '{rel}' passes through the symlink '{link}'")
            }
            Ok(OnDisk::Outside(resolved)) => format!(
                "path '{rel}' resolves to '{}' outside the repository",
                resolved.display()
            ),
            Ok(OnDisk::Inside(_)) => {
                let root = std::iter::once(&self.intent_root)
                    .chain(&self.protected_roots)
                    .filter_map(|root| canonical_relative(repo_root, root).ok().flatten())
                    .find(|root| is_under(rel, root))?;
                format!("path '{rel}' resolves under the protected root '{root}'")
            }
        };

        warn!(path = %target, "hard invariant violation on disk");
        Some(hard_invariant_report(rel, message))
    }

    fn report_for(&self, rule: &PolicyRule, path: &str) -> ViolationReport {
        let blocking = rule.blocks(self.strict_mode);
        let message = rule.message.clone().unwrap_or_else(|| {
            format!(
                "path '{path}' matches {} rule '{}' ({})",
                rule.authority, rule.id, rule.path_pattern
            )
        });
        ViolationReport {
            rule_name: rule.id.clone(),
            path: path.to_string(),
            message,
            severity: rule.severity,
            authority: rule.authority,
            blocking,
            suggested_fix: rule.suggested_fix.clone(),
            source_policy: rule.owning_policy_id.clone(),
        }
    }
}

fn hard_invariant_report(path: &str, message: String) -> ViolationReport {
    ViolationReport {
        rule_name: HARD_INVARIANT_RULE.to_string(),
        path: path.to_string(),
        message,
        severity: RuleSeverity::Blocking,
        authority: Authority::HardInvariant,
        blocking: true,
        suggested_fix: Some(
            "constitutional intent and governance state change only through an amendment process"
                .into(),
        ),
        source_policy: HARD_INVARIANT_POLICY.to_string(),
    }
}
