//! The enforcement check template.
//!
//! Every concrete policy check is an [`EnforcementCheck`]: one or more
//! rule ids, each bound to zero or more independent strategies. Running
//! the check:
//!
//! 1. resolves the owning policy from the [`PolicyRegistry`];
//!    unresolvable → a single `policy.missing` finding, nothing else runs;
//! 2. for each rule id, looks up its raw definition;
//!    absent → `rule.not_declared`;
//! 3. runs every bound strategy, flattening sync and async results.
//!    Strategy errors and panics become `strategy.failed` findings.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use charter_policy::{PolicyDocument, PolicyRegistry};
use charter_types::Finding;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::strategy::{StrategyContext, StrategyRegistry, VerificationStrategy};

pub const POLICY_MISSING: &str = "policy.missing";
pub const RULE_NOT_DECLARED: &str = "rule.not_declared";
pub const STRATEGY_FAILED: &str = "strategy.failed";

/// A policy check built on the enforcement template.
#[derive(Clone, Debug)]
pub struct EnforcementCheck {
    id: String,
    /// Explicit owning policy; otherwise resolved through the rule ids.
    policy_id: Option<String>,
    /// Explicit rule ids; otherwise inferred from the strategy bindings.
    declared_rules: Option<Vec<String>>,
    strategies: StrategyRegistry,
    policies: Arc<PolicyRegistry>,
    repo_root: PathBuf,
}

impl EnforcementCheck {
    pub fn new(
        id: impl Into<String>,
        policies: Arc<PolicyRegistry>,
        strategies: StrategyRegistry,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            policy_id: None,
            declared_rules: None,
            strategies,
            policies,
            repo_root: repo_root.into(),
        }
    }

    /// Pin the owning policy instead of resolving it from the rules.
    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    /// Declare the rule ids this check enforces.
    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_rules = Some(rules.into_iter().map(Into::into).collect());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rule ids this check enforces.
    pub fn rule_ids(&self) -> Vec<String> {
        match &self.declared_rules {
            Some(rules) => rules.clone(),
            None => self.strategies.rule_ids().map(str::to_string).collect(),
        }
    }

    fn resolve_policy(&self, rule_ids: &[String]) -> Option<Arc<PolicyDocument>> {
        match &self.policy_id {
            Some(id) => self.policies.policy(id),
            None => rule_ids
                .iter()
                .find_map(|r| self.policies.policy_for_rule(r)),
        }
    }

    /// Run the check.
    pub async fn execute(&self) -> Vec<Finding> {
        let rule_ids = self.rule_ids();

        let Some(policy) = self.resolve_policy(&rule_ids) else {
            warn!(check = %self.id, "owning policy could not be resolved");
            let target = self
                .policy_id
                .clone()
                .unwrap_or_else(|| rule_ids.join(", "));
            return vec![Finding::error(
                POLICY_MISSING,
                format!("check '{}': no policy found for {}", self.id, target),
            )];
        };

        let mut findings = Vec::new();
        for rule_id in &rule_ids {
            let Some(definition) = policy.rule(rule_id) else {
                findings.push(
                    Finding::error(
                        RULE_NOT_DECLARED,
                        format!("rule '{}' is not declared in policy '{}'", rule_id, policy.id),
                    )
                    .with_rule(rule_id.clone()),
                );
                continue;
            };

            let ctx = StrategyContext {
                repo_root: self.repo_root.clone(),
                rule_id: rule_id.clone(),
                policy_id: policy.id.clone(),
                rule: definition.clone(),
            };

            for strategy in self.strategies.strategies_for(rule_id) {
                let mut produced = run_strategy(strategy, &ctx).await;
                for finding in &mut produced {
                    if finding.rule_id.is_none() {
                        finding.rule_id = Some(rule_id.clone());
                    }
                }
                findings.extend(produced);
            }
        }

        debug!(
            check = %self.id,
            policy = %policy.id,
            findings = findings.len(),
            "enforcement check executed"
        );
        findings
    }
}

async fn run_strategy(strategy: &VerificationStrategy, ctx: &StrategyContext) -> Vec<Finding> {
    let outcome = match strategy {
        VerificationStrategy::Sync(s) => {
            std::panic::catch_unwind(AssertUnwindSafe(|| s.verify(ctx)))
        }
        VerificationStrategy::Async(s) => AssertUnwindSafe(s.verify(ctx)).catch_unwind().await,
    };

    match outcome {
        Ok(Ok(findings)) => findings,
        Ok(Err(e)) => {
            warn!(strategy = strategy.name(), rule = %ctx.rule_id, error = %e, "strategy failed");
            vec![Finding::error(
                STRATEGY_FAILED,
                format!("strategy '{}' failed: {}", strategy.name(), e),
            )]
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            warn!(strategy = strategy.name(), rule = %ctx.rule_id, "strategy panicked");
            vec![Finding::error(
                STRATEGY_FAILED,
                format!("strategy '{}' panicked: {}", strategy.name(), detail),
            )]
        }
    }
}

/// A set of checks run together.
#[derive(Clone, Debug, Default)]
pub struct CheckSuite {
    checks: Vec<EnforcementCheck>,
}

impl CheckSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, check: EnforcementCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check in order and concatenate the findings.
    pub async fn execute_all(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        for check in &self.checks {
            findings.extend(check.execute().await);
        }
        findings
    }
}
