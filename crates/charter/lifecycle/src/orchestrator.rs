//! Proposal lifecycle orchestration.
//!
//! ```text
//! Pending ──sign──▶ Signed(n) ──approve──▶ Approved ──▶ Applied
//!    │                  │
//!    └──withdraw────────┴──▶ Withdrawn
//! ```
//!
//! `approve` is a strictly sequential pipeline. Each stage either passes
//! or ends the call with a typed [`ApproveError`]:
//!
//! ```text
//! lock → load → target → intent guard (lexical, then on disk) → quorum
//!      → canary (timeout) → on-disk guard again → rollback archive
//!      → atomic apply → remove proposal
//! ```
//!
//! Quorum is checked before any sandbox is created, and the rollback
//! record is durable before the live tree changes. The applied file's
//! modification time always postdates the record's `archived_at`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use charter_approval::{
    ApprovalError, ApproverConfig, ApproverRegistry, CriticalPathSet, CriticalPathsConfig,
    CryptoApprovalEngine, ProposalLock, ProposalStore, SigningKey,
};
use charter_canary::{AuditPipeline, CanarySandbox, CommandAuditPipeline, StaticAuditPipeline};
use charter_policy::path::{normalize, NormalizedPath};
use charter_policy::{IntentGuard, PolicyCompiler, PolicyError, PolicyStore};
use charter_types::{ApprovalToken, AuditFinding, Proposal, Signature};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::archive::{RollbackArchiver, RollbackRecord};
use crate::config::EngineConfig;
use crate::error::{ApproveError, LifecycleResult};

// ── Status ──────────────────────────────────────────────────────────────

/// Where a pending proposal stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    /// No valid signatures.
    Pending,
    /// Some valid signatures, below quorum.
    Signed(u32),
    /// Quorum met; ready for `approve`.
    QuorumMet,
    /// No target path; can never be approved.
    Invalid,
}

impl std::fmt::Display for ProposalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Signed(n) => write!(f, "signed({n})"),
            Self::QuorumMet => write!(f, "quorum met"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStatus {
    pub name: String,
    pub target_path: Option<String>,
    pub valid_signatures: u32,
    pub required: u32,
    pub critical: bool,
    /// Signatures made over an older version of the content.
    pub stale: usize,
    pub state: ProposalState,
}

/// A change that went live.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApproveOutcome {
    pub name: String,
    /// Live file that was written.
    pub applied_path: PathBuf,
    pub valid_signatures: u32,
    pub required: u32,
    /// Non-blocking findings from the canary run.
    pub canary_findings: Vec<AuditFinding>,
    pub rollback: RollbackRecord,
}

// ── Orchestrator ────────────────────────────────────────────────────────

/// Drives proposals from signing to live application.
pub struct ProposalLifecycleOrchestrator {
    repo_root: PathBuf,
    store: ProposalStore,
    guard: Arc<IntentGuard>,
    approvals: CryptoApprovalEngine,
    canary: CanarySandbox,
    archiver: RollbackArchiver,
    canary_timeout: Duration,
}

impl std::fmt::Debug for ProposalLifecycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalLifecycleOrchestrator")
            .field("repo_root", &self.repo_root)
            .field("store", &self.store)
            .field("canary", &self.canary)
            .field("archiver", &self.archiver)
            .field("canary_timeout", &self.canary_timeout)
            .finish()
    }
}

impl ProposalLifecycleOrchestrator {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        store: ProposalStore,
        guard: Arc<IntentGuard>,
        approvals: CryptoApprovalEngine,
        canary: CanarySandbox,
        archiver: RollbackArchiver,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            store,
            guard,
            approvals,
            canary,
            archiver,
            canary_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_canary_timeout(mut self, timeout: Duration) -> Self {
        self.canary_timeout = timeout;
        self
    }

    /// Assemble every component from an engine config.
    ///
    /// Missing policy directories, approver files and critical-path files
    /// fall back to empty defaults with a warning. With no approvers
    /// configured nothing can ever reach quorum.
    pub fn from_config(config: &EngineConfig) -> LifecycleResult<Self> {
        let policies_dir = config.resolve(&config.policies_dir);
        let policies = match PolicyStore::load(&policies_dir) {
            Ok(store) => store,
            Err(PolicyError::StoreNotFound(dir)) => {
                warn!(dir = %dir.display(), "policy directory not found, no rules loaded");
                PolicyStore::default()
            }
            Err(e) => return Err(e.into()),
        };
        let rules = PolicyCompiler::new()
            .with_static_analysis_engines(&config.static_analysis_engines)
            .compile(&policies);
        let guard = IntentGuard::new(rules, config.guard_config());

        let approvers = match ApproverConfig::load(&config.resolve(&config.approvers_file)) {
            Ok(c) => c,
            Err(ApprovalError::FileNotFound(path)) => {
                warn!(path = %path.display(), "approver file not found, no approvers registered");
                ApproverConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        let critical = match CriticalPathsConfig::load(&config.resolve(&config.critical_paths_file)) {
            Ok(c) => c,
            Err(ApprovalError::FileNotFound(_)) => CriticalPathsConfig::default(),
            Err(e) => return Err(e.into()),
        };
        let registry = ApproverRegistry::from_config(approvers, CriticalPathSet::from_config(&critical));

        let pipeline: Arc<dyn AuditPipeline> = match config
            .audit_command
            .as_deref()
            .and_then(CommandAuditPipeline::from_command_line)
        {
            Some(p) => Arc::new(p),
            None => {
                warn!("no audit command configured, canary runs perform no validation");
                Arc::new(StaticAuditPipeline::passing())
            }
        };

        Ok(Self::new(
            config.repo_root.clone(),
            ProposalStore::new(config.resolve(&config.proposals_dir)),
            Arc::new(guard),
            CryptoApprovalEngine::new(Arc::new(registry)),
            CanarySandbox::new(config.resolve(&config.sandbox_root), pipeline),
            RollbackArchiver::new(config.resolve(&config.archive_dir)),
        )
        .with_canary_timeout(config.canary_timeout()))
    }

    pub fn store(&self) -> &ProposalStore {
        &self.store
    }

    pub fn archiver(&self) -> &RollbackArchiver {
        &self.archiver
    }

    pub fn approvals(&self) -> &CryptoApprovalEngine {
        &self.approvals
    }

    pub fn guard(&self) -> &IntentGuard {
        &self.guard
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Status of every pending proposal.
    pub fn list(&self) -> LifecycleResult<Vec<ProposalStatus>> {
        Ok(self
            .store
            .list()?
            .iter()
            .map(|p| self.status_of(p))
            .collect())
    }

    pub fn status_of(&self, proposal: &Proposal) -> ProposalStatus {
        let report = self.approvals.verify(proposal);
        let target = proposal.target_path.clone().filter(|t| !t.trim().is_empty());
        let (critical, required) = match &target {
            Some(t) => {
                let rel = self.repo_relative(t);
                (self.approvals.is_critical(&rel), self.approvals.required_quorum(&rel))
            }
            None => (false, 0),
        };
        let state = match (&target, report.valid_count) {
            (None, _) => ProposalState::Invalid,
            (_, n) if n >= required => ProposalState::QuorumMet,
            (_, 0) => ProposalState::Pending,
            (_, n) => ProposalState::Signed(n),
        };
        ProposalStatus {
            name: proposal.name.clone(),
            target_path: target,
            valid_signatures: report.valid_count,
            required,
            critical,
            stale: report.stale_count(),
            state,
        }
    }

    /// `target` as the repository-relative path the apply step writes.
    fn repo_relative(&self, target: &str) -> String {
        normalize(Path::new(target), Some(&self.repo_root))
            .as_str()
            .to_string()
    }

    /// Re-run the hard invariant for `rel` against the filesystem.
    fn check_on_disk(&self, name: &str, rel: &str) -> Result<(), ApproveError> {
        match self.guard.check_resolved(rel) {
            None => Ok(()),
            Some(report) => {
                warn!(proposal = %name, target = %rel, reason = %report.message, "blocked by intent guard on disk");
                Err(ApproveError::PolicyViolation {
                    name: name.to_string(),
                    violations: vec![report],
                })
            }
        }
    }

    /// Sign the current content of `name` as `identity`.
    ///
    /// Replaces any earlier signature by the same identity.
    pub fn sign(&self, name: &str, identity: &str, key: &SigningKey) -> LifecycleResult<Signature> {
        self.store.path_for(name)?;
        let _lock = ProposalLock::acquire(self.store.dir(), name)?;

        let proposal = self.store.load(name)?;
        match self.approvals.registry().key(identity) {
            Some(registered) if *registered != key.verifying_key() => {
                warn!(proposal = %proposal.name, identity = %identity, "signing key does not match the registered key");
            }
            None => warn!(proposal = %proposal.name, identity = %identity, "identity is not a registered approver"),
            _ => {}
        }

        let signature = CryptoApprovalEngine::sign(&proposal, identity, key);
        self.store.upsert_signature(&proposal.name, signature.clone())?;
        Ok(signature)
    }

    /// Delete a pending proposal. Returns whether it existed.
    pub fn withdraw(&self, name: &str) -> LifecycleResult<bool> {
        self.store.path_for(name)?;
        let _lock = ProposalLock::acquire(self.store.dir(), name)?;
        let removed = self.store.delete(name)?;
        if removed {
            info!(proposal = %name, "proposal withdrawn");
        }
        Ok(removed)
    }

    /// Take `name` through guard, quorum, canary, archive and apply.
    pub async fn approve(&self, name: &str) -> Result<ApproveOutcome, ApproveError> {
        self.store.path_for(name)?;
        let _lock = ProposalLock::acquire(self.store.dir(), name)?;

        let proposal = self.store.load(name)?;
        let name = proposal.name.clone();
        info!(proposal = %name, "approval started");

        let target = proposal
            .target_path
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApproveError::InvalidProposal {
                name: name.clone(),
                reason: "missing target_path".into(),
            })?;

        let validation = self.guard.evaluate(&[target.as_str()], None);
        for advisory in validation.advisory() {
            warn!(proposal = %name, rule = %advisory.rule_name, "advisory policy match");
        }
        if !validation.is_valid {
            let violations: Vec<_> = validation.blocking().cloned().collect();
            warn!(proposal = %name, target = %target, violations = violations.len(), "blocked by intent guard");
            return Err(ApproveError::PolicyViolation { name, violations });
        }

        let rel = match normalize(Path::new(&target), Some(&self.repo_root)) {
            NormalizedPath::Relative(rel) if !rel.is_empty() => rel,
            _ => {
                return Err(ApproveError::InvalidProposal {
                    name,
                    reason: format!("target {target} is outside the repository"),
                })
            }
        };
        let live = self.repo_root.join(&rel);
        self.check_on_disk(&name, &rel)?;

        let report = self.approvals.verify(&proposal);
        let required = self.approvals.required_quorum(&rel);
        if report.valid_count < required {
            warn!(proposal = %name, valid = report.valid_count, required, "quorum not met");
            return Err(ApproveError::QuorumNotMet {
                name,
                valid: report.valid_count,
                required,
            });
        }
        debug!(proposal = %name, valid = report.valid_count, required, "quorum met");

        let canary = match tokio::time::timeout(
            self.canary_timeout,
            self.canary.run(&self.repo_root, &proposal),
        )
        .await
        {
            Err(_) => {
                warn!(proposal = %name, timeout = ?self.canary_timeout, "canary timed out");
                return Err(ApproveError::CanaryTimedOut {
                    name,
                    timeout: self.canary_timeout,
                });
            }
            Ok(Err(source)) => return Err(ApproveError::CanaryAborted { name, source }),
            Ok(Ok(result)) => result,
        };
        if !canary.passed {
            return Err(ApproveError::CanaryFailed {
                name,
                findings: canary.findings,
                sandbox_path: canary.sandbox_path,
            });
        }

        // The tree may have changed while the canary ran.
        self.check_on_disk(&name, &rel)?;

        let previous_hash = match tokio::fs::read(&live).await {
            Ok(bytes) => Some(ApprovalToken::for_content(&String::from_utf8_lossy(&bytes)).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                warn!(proposal = %name, path = %live.display(), error = %source, "live file unreadable, nothing archived");
                return Err(ApproveError::LiveReadFailed { path: live, source });
            }
        };
        let rollback = self
            .archiver
            .archive(&proposal, previous_hash)
            .await
            .map_err(ApproveError::ArchiveFailed)?;

        apply_atomic(&live, &proposal.content, rollback.archived_at.into())
            .await
            .map_err(|source| ApproveError::ApplyFailed {
                path: live.clone(),
                source,
            })?;
        info!(proposal = %name, path = %live.display(), "change applied");

        if let Err(e) = self.store.delete(&name) {
            warn!(proposal = %name, error = %e, "change applied but proposal could not be removed");
        }

        Ok(ApproveOutcome {
            name,
            applied_path: live,
            valid_signatures: report.valid_count,
            required,
            canary_findings: canary.findings,
            rollback,
        })
    }
}

/// Replace `path` with `content` via a sibling temp file and rename.
///
/// The new file's modification time is stamped strictly after
/// `modified_after`.
async fn apply_atomic(path: &Path, content: &str, modified_after: SystemTime) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.charter-tmp"));

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(content.as_bytes()).await?;
    let file = file.into_std().await;
    let stamp = SystemTime::now().max(modified_after + Duration::from_micros(1));
    tokio::task::spawn_blocking(move || {
        file.set_modified(stamp)?;
        file.sync_all()
    })
    .await
    .map_err(std::io::Error::other)??;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
