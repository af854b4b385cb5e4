//! Shared harness for the Charter end-to-end, adversarial and property suites.
//!
//! [`TestRepo`] lays out a throwaway repository whose `.charter/` directory
//! matches the [`EngineConfig`] defaults, so orchestrators can be built
//! either straight from config or with an instrumented audit pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use charter_approval::{
    public_key_pem, ApproverConfig, ApproverEntry, ApproverRegistry, CriticalPathSet,
    CriticalPathsConfig, CryptoApprovalEngine, ProposalStore, QuorumConfig, QuorumThresholds,
    SigningKey,
};
use charter_canary::{AuditPipeline, CanarySandbox, SandboxResult};
use charter_lifecycle::{EngineConfig, ProposalLifecycleOrchestrator, RollbackArchiver};
use charter_policy::{IntentGuard, PolicyCompiler, PolicyStore};
use charter_types::{AuditFinding, Finding, Proposal};
use tempfile::TempDir;

/// Quorum mode written into generated approver files.
pub const QUORUM_MODE: &str = "standard_ops";

const CONSTITUTION: &str = "\
id: constitution
authority: constitutional
rules:
  - id: constitution.governance
    pattern: \"src/governance/**\"
    message: Governance code is constitutionally protected
    suggested_fix: Amend the constitution instead
";

const CODE_STANDARDS: &str = "\
id: code_standards
authority: policy
rules:
  - id: standards.generated
    pattern: \"src/generated/**\"
    severity: blocking
    message: Generated code must not be edited by hand
  - id: standards.docs
    pattern: \"docs/**\"
    severity: advisory
    message: Docs changes should be reviewed by the docs owners
";

const PRECEDENCE: &str = "precedence: [constitution, code_standards]\n";

/// Deterministic key for `seed`.
pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

// ── Repository ──────────────────────────────────────────────────────────

/// A temporary repository with a populated `.charter/` directory.
pub struct TestRepo {
    dir: TempDir,
    config: EngineConfig,
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepo {
    /// Repository with application code, a constitution under `.intent/`
    /// and the default policy set. No approvers are registered.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp repo");
        let config = EngineConfig::default().with_repo_root(dir.path());
        let repo = Self { dir, config };
        repo.write("src/app.py", "print('v1')\n");
        repo.write("src/governance/quorum.py", "QUORUM = 2\n");
        repo.write(".intent/constitution/core.yaml", "principles: []\n");
        repo.write(".charter/policies/constitution.yaml", CONSTITUTION);
        repo.write(".charter/policies/code_standards.yaml", CODE_STANDARDS);
        repo.write(".charter/policies/precedence.yaml", PRECEDENCE);
        repo
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strict(mut self) -> Self {
        self.config.strict_mode = true;
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut EngineConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Register `approvers` with the given standard and critical quorum.
    pub fn with_approvers(self, approvers: &[(&str, &SigningKey)], standard: u32, critical: u32) -> Self {
        let config = ApproverConfig {
            approvers: approvers
                .iter()
                .map(|(identity, key)| ApproverEntry {
                    identity: identity.to_string(),
                    public_key: public_key_pem(key).expect("encode public key"),
                })
                .collect(),
            quorum: QuorumConfig::default()
                .with_mode(
                    QUORUM_MODE,
                    QuorumThresholds {
                        standard: Some(standard),
                        critical: Some(critical),
                    },
                )
                .active(QUORUM_MODE),
        };
        let yaml = serde_yaml::to_string(&config).expect("encode approvers");
        self.write_abs(&self.config.resolve(&self.config.approvers_file), &yaml);
        self
    }

    pub fn with_critical_paths(self, paths: &[&str]) -> Self {
        let config = CriticalPathsConfig {
            paths: paths.iter().map(|p| p.to_string()).collect(),
        };
        let yaml = serde_yaml::to_string(&config).expect("encode critical paths");
        self.write_abs(&self.config.resolve(&self.config.critical_paths_file), &yaml);
        self
    }

    /// Add or replace a policy document.
    pub fn with_policy(self, file_name: &str, yaml: &str) -> Self {
        let path = self.config.resolve(&self.config.policies_dir).join(file_name);
        self.write_abs(&path, yaml);
        self
    }

    // ── Files ───────────────────────────────────────────────────────────

    pub fn write(&self, rel: &str, content: &str) {
        self.write_abs(&self.root().join(rel), content);
    }

    fn write_abs(&self, path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, content).expect("write file");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root().join(rel)).expect("read file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root().join(rel).exists()
    }

    /// Every file outside `.charter/`, keyed by relative path.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect(self.root(), self.root(), &mut files);
        files
    }

    // ── Components ──────────────────────────────────────────────────────

    pub fn store(&self) -> ProposalStore {
        ProposalStore::new(self.config.resolve(&self.config.proposals_dir))
    }

    pub fn propose(&self, name: &str, target: &str, content: &str) -> Proposal {
        let proposal = Proposal::new(name, target, content, "integration test change")
            .with_proposer("integration")
            .with_rollback_plan(serde_yaml::from_str("{strategy: revert}").expect("rollback plan"));
        self.store().save(&proposal).expect("save proposal");
        proposal
    }

    pub fn archiver(&self) -> RollbackArchiver {
        RollbackArchiver::new(self.config.resolve(&self.config.archive_dir))
    }

    pub fn sandbox_path(&self, proposal_name: &str) -> PathBuf {
        self.config.resolve(&self.config.sandbox_root).join(proposal_name)
    }

    /// Orchestrator assembled from the on-disk configuration.
    pub fn orchestrator(&self) -> ProposalLifecycleOrchestrator {
        ProposalLifecycleOrchestrator::from_config(&self.config).expect("assemble orchestrator")
    }

    /// Orchestrator assembled from the same files, auditing with `pipeline`.
    pub fn orchestrator_with(&self, pipeline: Arc<dyn AuditPipeline>) -> ProposalLifecycleOrchestrator {
        let config = &self.config;
        let policies = PolicyStore::load(&config.resolve(&config.policies_dir)).expect("load policies");
        let guard = IntentGuard::new(
            PolicyCompiler::new()
                .with_static_analysis_engines(&config.static_analysis_engines)
                .compile(&policies),
            config.guard_config(),
        );
        let approvers = ApproverConfig::load(&config.resolve(&config.approvers_file)).unwrap_or_default();
        let critical = CriticalPathsConfig::load(&config.resolve(&config.critical_paths_file))
            .unwrap_or_default();
        let registry = ApproverRegistry::from_config(approvers, CriticalPathSet::from_config(&critical));

        ProposalLifecycleOrchestrator::new(
            config.repo_root.clone(),
            self.store(),
            Arc::new(guard),
            CryptoApprovalEngine::new(Arc::new(registry)),
            CanarySandbox::new(config.resolve(&config.sandbox_root), pipeline),
            self.archiver(),
        )
        .with_canary_timeout(config.canary_timeout())
    }
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.file_name().is_some_and(|n| n == ".charter") {
            continue;
        }
        if path.is_dir() {
            collect(root, &path, files);
        } else if let Ok(bytes) = std::fs::read(&path) {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            files.insert(rel.to_string_lossy().replace('\\', "/"), bytes);
        }
    }
}

// ── Audit Pipelines ─────────────────────────────────────────────────────

/// Audit pipeline that records every run.
///
/// Optionally reads a file from inside the sandbox while auditing so
/// tests can see exactly what the canary saw.
#[derive(Default)]
pub struct RecordingPipeline {
    calls: AtomicUsize,
    findings: Vec<AuditFinding>,
    observe: Option<String>,
    seen: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl RecordingPipeline {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self::default().with_finding(Finding::error("tests", message))
    }

    pub fn with_finding(mut self, finding: impl Into<AuditFinding>) -> Self {
        self.findings.push(finding.into());
        self
    }

    /// Read `rel` from the sandbox on every audit.
    pub fn observing(mut self, rel: &str) -> Self {
        self.observe = Some(rel.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sandbox roots audited so far, with the observed file content.
    pub fn seen(&self) -> Vec<(PathBuf, Option<String>)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditPipeline for RecordingPipeline {
    fn name(&self) -> &str {
        "recording"
    }

    async fn audit(&self, sandbox_root: &Path) -> SandboxResult<Vec<AuditFinding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let observed = self
            .observe
            .as_ref()
            .and_then(|rel| std::fs::read_to_string(sandbox_root.join(rel)).ok());
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((sandbox_root.to_path_buf(), observed));
        }
        Ok(self.findings.clone())
    }
}
