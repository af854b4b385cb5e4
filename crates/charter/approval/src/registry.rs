//! Approver registry, quorum configuration and critical paths.
//!
//! ```yaml
//! # approvers.yaml
//! approvers:
//!   - identity: alice
//!     public_key: |
//!       -----BEGIN PUBLIC KEY-----
//!       ...
//! quorum:
//!   current_mode: production
//!   development: { standard: 1, critical: 1 }
//!   production:  { standard: 2, critical: 3 }
//!
//! # critical_paths.yaml
//! paths:
//!   - src/kernel/
//!   - "**/*.policy.yaml"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use charter_policy::path::normalize;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::VerifyingKey;
use globset::{Glob, GlobMatcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApprovalError, ApprovalResult};

/// Quorum when nothing is configured for a mode or classification.
pub const DEFAULT_QUORUM: u32 = 1;

// ── Config Files ────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverEntry {
    pub identity: String,
    /// SPKI PEM encoded ed25519 public key.
    pub public_key: String,
}

/// Per-mode thresholds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumThresholds {
    #[serde(default)]
    pub standard: Option<u32>,
    #[serde(default)]
    pub critical: Option<u32>,
}

/// `{current_mode, <mode>: {standard, critical}, ...}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumConfig {
    #[serde(default)]
    pub current_mode: Option<String>,
    #[serde(flatten)]
    pub modes: BTreeMap<String, QuorumThresholds>,
}

impl QuorumConfig {
    pub fn with_mode(mut self, mode: impl Into<String>, thresholds: QuorumThresholds) -> Self {
        self.modes.insert(mode.into(), thresholds);
        self
    }

    pub fn active(mut self, mode: impl Into<String>) -> Self {
        self.current_mode = Some(mode.into());
        self
    }

    /// Threshold for the active mode and classification, default 1.
    pub fn required(&self, critical: bool) -> u32 {
        self.current_mode
            .as_ref()
            .and_then(|mode| self.modes.get(mode))
            .and_then(|t| if critical { t.critical } else { t.standard })
            .unwrap_or(DEFAULT_QUORUM)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverConfig {
    #[serde(default)]
    pub approvers: Vec<ApproverEntry>,
    #[serde(default)]
    pub quorum: QuorumConfig,
}

impl ApproverConfig {
    pub fn load(path: &Path) -> ApprovalResult<Self> {
        load_yaml(path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalPathsConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

impl CriticalPathsConfig {
    pub fn load(path: &Path) -> ApprovalResult<Self> {
        load_yaml(path)
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> ApprovalResult<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApprovalError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(ApprovalError::io(path, e)),
    };
    serde_yaml::from_str(&raw).map_err(|e| ApprovalError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// ── Critical Paths ──────────────────────────────────────────────────────

enum CriticalEntry {
    Suffix(String),
    Glob(GlobMatcher),
}

/// Paths whose changes need the stricter quorum.
///
/// Plain entries match by path suffix on a component boundary
/// (`kernel/boot.rs` matches `src/kernel/boot.rs`, not `src/xkernel/boot.rs`);
/// a trailing `/` matches everything below that directory. Entries with
/// glob metacharacters are matched as globs.
#[derive(Default)]
pub struct CriticalPathSet {
    entries: Vec<CriticalEntry>,
}

impl std::fmt::Debug for CriticalPathSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalPathSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl CriticalPathSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for raw in paths {
            let raw = raw.as_ref().trim();
            let entry = normalize_entry(raw);
            if entry.is_empty() {
                continue;
            }
            if entry.contains(['*', '?', '[', '{']) {
                match Glob::new(&entry) {
                    Ok(glob) => entries.push(CriticalEntry::Glob(glob.compile_matcher())),
                    Err(e) => warn!(pattern = %raw, error = %e, "skipping malformed critical path glob"),
                }
            } else {
                entries.push(CriticalEntry::Suffix(entry));
            }
        }
        Self { entries }
    }

    pub fn from_config(config: &CriticalPathsConfig) -> Self {
        Self::new(&config.paths)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `target` touches a critical path.
    ///
    /// `.` and `..` segments are collapsed first, so every spelling of a
    /// file classifies the same way as the path the apply step writes.
    pub fn is_critical(&self, target: &str) -> bool {
        let target = normalize_target(target);
        self.entries.iter().any(|entry| match entry {
            CriticalEntry::Glob(m) => m.is_match(&target),
            CriticalEntry::Suffix(suffix) => suffix_match(&target, suffix),
        })
    }
}

fn normalize_target(target: &str) -> String {
    normalize(Path::new(target), None).as_str().to_string()
}

fn normalize_entry(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut s = path.as_str();
    while let Some(rest) = s.strip_prefix("./") {
        s = rest;
    }
    s.to_string()
}

fn suffix_match(target: &str, suffix: &str) -> bool {
    if let Some(dir) = suffix.strip_suffix('/') {
        let dir = format!("/{dir}/");
        return format!("/{target}").contains(&dir);
    }
    target == suffix || target.ends_with(&format!("/{suffix}"))
}

// ── Approver Registry ───────────────────────────────────────────────────

/// Read-only identity → public key table plus quorum rules.
#[derive(Debug, Default)]
pub struct ApproverRegistry {
    keys: HashMap<String, VerifyingKey>,
    quorum: QuorumConfig,
    critical_paths: CriticalPathSet,
}

impl ApproverRegistry {
    pub fn new(quorum: QuorumConfig, critical_paths: CriticalPathSet) -> Self {
        Self {
            keys: HashMap::new(),
            quorum,
            critical_paths,
        }
    }

    /// Build from parsed config. Keys that fail to decode are skipped
    /// with a warning; those identities can never count toward quorum.
    pub fn from_config(config: ApproverConfig, critical_paths: CriticalPathSet) -> Self {
        let mut registry = Self::new(config.quorum, critical_paths);
        for entry in config.approvers {
            match parse_public_key(&entry.public_key) {
                Ok(key) => registry.register(entry.identity, key),
                Err(e) => warn!(identity = %entry.identity, error = %e, "skipping approver with invalid key"),
            }
        }
        registry
    }

    pub fn register(&mut self, identity: impl Into<String>, key: VerifyingKey) {
        self.keys.insert(identity.into(), key);
    }

    pub fn with_key(mut self, identity: impl Into<String>, key: VerifyingKey) -> Self {
        self.register(identity, key);
        self
    }

    pub fn key(&self, identity: &str) -> Option<&VerifyingKey> {
        self.keys.get(identity)
    }

    pub fn identities(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn quorum(&self) -> &QuorumConfig {
        &self.quorum
    }

    pub fn critical_paths(&self) -> &CriticalPathSet {
        &self.critical_paths
    }
}

/// Decode an SPKI PEM ed25519 public key.
pub fn parse_public_key(pem: &str) -> ApprovalResult<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem.trim()).map_err(|e| ApprovalError::InvalidKey(e.to_string()))
}
