//! Verification strategies and the rule-id → strategy registry.
//!
//! A strategy verifies one aspect of one rule. Strategies are either
//! synchronous ([`SyncStrategy`]) or asynchronous ([`AsyncStrategy`]);
//! the check template runs both kinds and flattens their findings.
//!
//! The registry is built once at startup from concrete strategy objects.
//! There is no lookup by class name at run time.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use charter_types::Finding;

use crate::error::StrategyResult;

// ── Context ─────────────────────────────────────────────────────────────

/// Immutable input handed to a strategy.
#[derive(Clone, Debug)]
pub struct StrategyContext {
    /// Repository root the check runs against.
    pub repo_root: PathBuf,
    pub rule_id: String,
    /// Policy that owns the rule.
    pub policy_id: String,
    /// Raw rule definition from the policy registry.
    pub rule: serde_json::Value,
}

impl StrategyContext {
    /// String list stored under `key` in the rule definition.
    pub fn string_list(&self, key: &str) -> Option<Vec<String>> {
        self.rule.get(key).and_then(|v| v.as_array()).map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
    }
}

// ── Strategy Traits ─────────────────────────────────────────────────────

/// A synchronous verification strategy.
pub trait SyncStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn verify(&self, ctx: &StrategyContext) -> StrategyResult<Vec<Finding>>;
}

/// An asynchronous verification strategy.
#[async_trait]
pub trait AsyncStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn verify(&self, ctx: &StrategyContext) -> StrategyResult<Vec<Finding>>;
}

/// A strategy bound to a rule id.
#[derive(Clone)]
pub enum VerificationStrategy {
    Sync(Arc<dyn SyncStrategy>),
    Async(Arc<dyn AsyncStrategy>),
}

impl VerificationStrategy {
    pub fn name(&self) -> &str {
        match self {
            Self::Sync(s) => s.name(),
            Self::Async(s) => s.name(),
        }
    }
}

impl std::fmt::Debug for VerificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(s) => write!(f, "Sync({})", s.name()),
            Self::Async(s) => write!(f, "Async({})", s.name()),
        }
    }
}

// ── Registry ────────────────────────────────────────────────────────────

/// Compile-time table of rule id → strategies.
#[derive(Clone, Debug, Default)]
pub struct StrategyRegistry {
    bindings: BTreeMap<String, Vec<VerificationStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a synchronous strategy to `rule_id`.
    pub fn bind_sync(mut self, rule_id: impl Into<String>, strategy: impl SyncStrategy + 'static) -> Self {
        self.bind(rule_id, VerificationStrategy::Sync(Arc::new(strategy)));
        self
    }

    /// Bind an asynchronous strategy to `rule_id`.
    pub fn bind_async(
        mut self,
        rule_id: impl Into<String>,
        strategy: impl AsyncStrategy + 'static,
    ) -> Self {
        self.bind(rule_id, VerificationStrategy::Async(Arc::new(strategy)));
        self
    }

    pub fn bind(&mut self, rule_id: impl Into<String>, strategy: VerificationStrategy) {
        self.bindings.entry(rule_id.into()).or_default().push(strategy);
    }

    /// Strategies bound to `rule_id`, in binding order.
    pub fn strategies_for(&self, rule_id: &str) -> &[VerificationStrategy] {
        self.bindings
            .get(rule_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rule ids with at least one bound strategy.
    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
