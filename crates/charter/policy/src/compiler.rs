//! Policy compiler.
//!
//! Turns the raw documents of a [`PolicyStore`] into an ordered list of
//! [`PolicyRule`]s. Order is `(precedence_rank, declaration_index)`:
//! rank comes from the precedence map, ties fall back to the order rules
//! were declared in.

use std::collections::BTreeSet;

use charter_types::{Authority, PolicyRule};
use tracing::{debug, warn};

use crate::store::{PolicyStore, RuleDeclaration};

/// Engines whose rules are pure static analysis by default.
pub const DEFAULT_STATIC_ANALYSIS_ENGINES: &[&str] = &["ast_gate", "regex_gate", "glob_gate"];

/// Compiles policy documents into ordered rules.
#[derive(Clone, Debug)]
pub struct PolicyCompiler {
    static_analysis_engines: BTreeSet<String>,
}

impl PolicyCompiler {
    pub fn new() -> Self {
        Self {
            static_analysis_engines: DEFAULT_STATIC_ANALYSIS_ENGINES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the set of engines treated as static analysis.
    pub fn with_static_analysis_engines<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_analysis_engines = engines.into_iter().map(Into::into).collect();
        self
    }

    /// Compile every path rule in `store`.
    ///
    /// Rules without a pattern are enforcement-only and are not compiled.
    /// Rules that fail to parse are skipped with a warning.
    pub fn compile(&self, store: &PolicyStore) -> Vec<PolicyRule> {
        let mut rules = Vec::new();
        let mut declaration_index = 0usize;

        for doc in &store.documents {
            let rank = store.precedence.rank(&doc.id);
            for raw in &doc.rules {
                let index = declaration_index;
                declaration_index += 1;

                let decl: RuleDeclaration = match serde_json::from_value(raw.clone()) {
                    Ok(decl) => decl,
                    Err(e) => {
                        warn!(policy = %doc.id, error = %e, "skipping undeclarable rule");
                        continue;
                    }
                };
                let Some(pattern) = decl.pattern else {
                    continue;
                };

                let static_analysis = decl
                    .engine
                    .as_deref()
                    .map(|e| self.static_analysis_engines.contains(e))
                    .unwrap_or(false);

                rules.push(PolicyRule {
                    id: decl.id,
                    path_pattern: pattern,
                    authority: decl
                        .authority
                        .or(doc.authority)
                        .unwrap_or(Authority::Policy),
                    severity: decl.severity,
                    owning_policy_id: doc.id.clone(),
                    precedence_rank: rank,
                    declaration_index: index,
                    engine: decl.engine,
                    static_analysis,
                    message: decl.message,
                    suggested_fix: decl.suggested_fix,
                });
            }
        }

        rules.sort_by_key(PolicyRule::order_key);
        debug!(rules = rules.len(), "policy rules compiled");
        rules
    }
}

impl Default for PolicyCompiler {
    fn default() -> Self {
        Self::new()
    }
}
