//! Proposal commands: list, sign, approve, withdraw, token.

use std::path::Path;

use anyhow::Context;
use charter_approval::load_signing_key;
use charter_lifecycle::{ApproveError, EngineConfig, ProposalLifecycleOrchestrator};

use crate::output::OutputFormat;

fn orchestrator(config: &EngineConfig) -> anyhow::Result<ProposalLifecycleOrchestrator> {
    ProposalLifecycleOrchestrator::from_config(config).context("assembling the governance engine")
}

pub fn list(config: &EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let statuses = orchestrator(config)?.list()?;
    if format.print_structured(&statuses)? {
        return Ok(());
    }
    if statuses.is_empty() {
        println!("No pending proposals.");
        return Ok(());
    }
    println!(
        "{:<12} {:<40} {:>9} {:>6}  {}",
        "NAME", "TARGET", "SIGNED", "STALE", "STATE"
    );
    for s in statuses {
        let target = s.target_path.as_deref().unwrap_or("-");
        let marker = if s.critical { " (critical)" } else { "" };
        println!(
            "{:<12} {:<40} {:>9} {:>6}  {}{}",
            s.name,
            target,
            format!("{}/{}", s.valid_signatures, s.required),
            s.stale,
            s.state,
            marker
        );
    }
    Ok(())
}

pub fn sign(
    config: &EngineConfig,
    name: &str,
    identity: &str,
    key_path: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let key = load_signing_key(key_path)
        .with_context(|| format!("loading signing key {}", key_path.display()))?;
    let signature = orchestrator(config)?.sign(name, identity, &key)?;
    if !format.print_structured(&signature)? {
        println!("✓ {} signed {} ({})", identity, name, signature.token);
    }
    Ok(())
}

pub async fn approve(config: &EngineConfig, name: &str, format: OutputFormat) -> anyhow::Result<()> {
    let orchestrator = orchestrator(config)?;
    match orchestrator.approve(name).await {
        Ok(outcome) => {
            if !format.print_structured(&outcome)? {
                println!(
                    "✓ {} applied to {} ({}/{} signatures)",
                    outcome.name,
                    outcome.applied_path.display(),
                    outcome.valid_signatures,
                    outcome.required
                );
                for finding in &outcome.canary_findings {
                    println!("  note: {}", finding.summary());
                }
            }
            Ok(())
        }
        Err(e) => {
            report_rejection(&e);
            Err(e.into())
        }
    }
}

fn report_rejection(e: &ApproveError) {
    match e {
        ApproveError::PolicyViolation { violations, .. } => {
            for v in violations {
                eprintln!("  ✗ [{}] {}: {}", v.authority, v.rule_name, v.message);
                if let Some(fix) = &v.suggested_fix {
                    eprintln!("      fix: {fix}");
                }
            }
        }
        ApproveError::CanaryFailed { findings, .. } => {
            for f in findings.iter().filter(|f| f.is_blocking()) {
                eprintln!("  ✗ {}", f.summary());
            }
        }
        _ => {}
    }
}

pub fn withdraw(config: &EngineConfig, name: &str) -> anyhow::Result<()> {
    if orchestrator(config)?.withdraw(name)? {
        println!("✓ {name} withdrawn");
    } else {
        println!("{name} was not pending");
    }
    Ok(())
}

pub fn token(config: &EngineConfig, name: &str) -> anyhow::Result<()> {
    let proposal = orchestrator(config)?.store().load(name)?;
    println!("{}", proposal.approval_token());
    Ok(())
}
