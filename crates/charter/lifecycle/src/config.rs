//! Engine configuration (`charter.toml`).
//!
//! Every field is optional; a missing file yields the defaults. Relative
//! paths are resolved against `repo_root`.
//!
//! ```toml
//! repo_root = "."
//! strict_mode = true
//! canary_timeout_secs = 900
//! audit_command = "make audit-json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use charter_policy::{GuardConfig, DEFAULT_INTENT_ROOT, DEFAULT_STATIC_ANALYSIS_ENGINES};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "charter.toml";
pub const CONFIG_ENV: &str = "CHARTER_CONFIG";

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub repo_root: PathBuf,
    /// Constitutional-intent root, relative to the repository.
    pub intent_root: PathBuf,
    pub strict_mode: bool,
    pub proposals_dir: PathBuf,
    pub policies_dir: PathBuf,
    pub approvers_file: PathBuf,
    pub critical_paths_file: PathBuf,
    pub sandbox_root: PathBuf,
    pub archive_dir: PathBuf,
    pub canary_timeout_secs: u64,
    /// Audit command run inside the sandbox, whitespace separated.
    pub audit_command: Option<String>,
    pub static_analysis_engines: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            intent_root: PathBuf::from(DEFAULT_INTENT_ROOT),
            strict_mode: false,
            proposals_dir: PathBuf::from(".charter/proposals"),
            policies_dir: PathBuf::from(".charter/policies"),
            approvers_file: PathBuf::from(".charter/approvers.yaml"),
            critical_paths_file: PathBuf::from(".charter/critical_paths.yaml"),
            sandbox_root: PathBuf::from(".charter/sandbox"),
            archive_dir: PathBuf::from(".charter/rollbacks"),
            canary_timeout_secs: 600,
            audit_command: None,
            static_analysis_engines: DEFAULT_STATIC_ANALYSIS_ENGINES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load from `path`; defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path from `CHARTER_CONFIG`, else `charter.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn with_repo_root(mut self, repo_root: impl Into<PathBuf>) -> Self {
        self.repo_root = repo_root.into();
        self
    }

    /// Resolve `path` against the repository root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    pub fn canary_timeout(&self) -> Duration {
        Duration::from_secs(self.canary_timeout_secs)
    }

    /// Locations holding the engine's own state. Proposals may never
    /// target them, whatever their quorum.
    pub fn protected_roots(&self) -> Vec<PathBuf> {
        vec![
            self.proposals_dir.clone(),
            self.policies_dir.clone(),
            self.approvers_file.clone(),
            self.critical_paths_file.clone(),
            self.sandbox_root.clone(),
            self.archive_dir.clone(),
            PathBuf::from(DEFAULT_CONFIG_FILE),
        ]
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            intent_root: self.intent_root.clone(),
            repo_root: Some(self.repo_root.clone()),
            strict_mode: self.strict_mode,
            protected_roots: self.protected_roots(),
        }
    }
}
