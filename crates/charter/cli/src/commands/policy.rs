//! Policy commands: evaluate, check.

use std::sync::Arc;

use anyhow::{bail, Context};
use charter_enforcement::{
    CheckSuite, EnforcementCheck, ForbiddenPathStrategy, RequiredFileStrategy, StrategyRegistry,
};
use charter_lifecycle::{EngineConfig, ProposalLifecycleOrchestrator};
use charter_policy::{PolicyDocument, PolicyRegistry, PolicyStore};
use charter_types::{Finding, Impact};

use crate::output::OutputFormat;

pub fn evaluate(
    config: &EngineConfig,
    paths: &[String],
    metadata_only: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let orchestrator = ProposalLifecycleOrchestrator::from_config(config)?;
    let impact = metadata_only.then_some(Impact::MetadataOnly);
    let result = orchestrator.guard().evaluate(paths, impact);

    if !format.print_structured(&result)? {
        for v in &result.violations {
            let mark = if v.blocking { "✗" } else { "!" };
            println!("{mark} [{}] {} {}: {}", v.authority, v.path, v.rule_name, v.message);
        }
        if result.is_valid {
            println!("✓ {} path(s) allowed", paths.len());
        }
    }
    if !result.is_valid {
        bail!("{} blocking violation(s)", result.blocking().count());
    }
    Ok(())
}

/// Bind the reference strategies to every rule that declares their parameters.
fn bindings_for(doc: &PolicyDocument) -> StrategyRegistry {
    let mut strategies = StrategyRegistry::new();
    for rule_id in doc.rule_ids() {
        let Some(rule) = doc.rule(rule_id) else {
            continue;
        };
        if rule.get("forbidden").is_some() {
            strategies = strategies.bind_sync(rule_id, ForbiddenPathStrategy);
        }
        if rule.get("required").is_some() {
            strategies = strategies.bind_sync(rule_id, RequiredFileStrategy);
        }
    }
    strategies
}

pub async fn check(
    config: &EngineConfig,
    only: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let dir = config.resolve(&config.policies_dir);
    let store = PolicyStore::load(&dir).with_context(|| format!("loading policies from {}", dir.display()))?;
    let registry = Arc::new(PolicyRegistry::from_store(&store));

    let mut suite = CheckSuite::new();
    for doc in &store.documents {
        if only.is_some_and(|id| id != doc.id) {
            continue;
        }
        let strategies = bindings_for(doc);
        if strategies.is_empty() {
            continue;
        }
        suite = suite.add(
            EnforcementCheck::new(doc.id.clone(), registry.clone(), strategies, config.repo_root.clone())
                .with_policy(doc.id.clone()),
        );
    }
    if let Some(id) = only {
        if suite.is_empty() && registry.policy(id).is_none() {
            bail!("policy {id} not found in {}", dir.display());
        }
    }

    let findings: Vec<Finding> = suite.execute_all().await;
    if !format.print_structured(&findings)? {
        for f in &findings {
            let mark = if f.is_blocking() { "✗" } else { "!" };
            let rule = f.rule_id.as_deref().unwrap_or("-");
            println!("{mark} [{}] {rule}: {}", f.check_id, f.message);
        }
        println!("{} check(s), {} finding(s)", suite.len(), findings.len());
    }

    let blocking = findings.iter().filter(|f| f.is_blocking()).count();
    if blocking > 0 {
        bail!("{blocking} blocking finding(s)");
    }
    Ok(())
}
