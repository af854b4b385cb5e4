//! Policy store: documents and the precedence map, loaded from disk once.
//!
//! Layout of a policy directory:
//!
//! ```text
//! policies/
//!   precedence.yaml        # { precedence: [policy_id, ...] }
//!   code_standards.yaml    # { id, authority?, rules: [...] }
//!   constitution.yaml
//! ```

use std::path::{Path, PathBuf};

use charter_types::{Authority, RuleSeverity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PolicyError, PolicyResult};

/// File name of the precedence map inside a policy directory.
pub const PRECEDENCE_FILE: &str = "precedence.yaml";

// ── Documents ───────────────────────────────────────────────────────────

/// A policy document as declared in the store.
///
/// Rules are kept as raw JSON values: the compiler extracts the fields
/// it understands, enforcement strategies read the rest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Default authority for rules that do not declare one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<Authority>,
    #[serde(default)]
    pub rules: Vec<serde_json::Value>,
    /// File the document was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl PolicyDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            authority: None,
            rules: Vec::new(),
            source: None,
        }
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn with_rule(mut self, rule: serde_json::Value) -> Self {
        self.rules.push(rule);
        self
    }

    /// Raw definition of the rule with id `rule_id`.
    pub fn rule(&self, rule_id: &str) -> Option<&serde_json::Value> {
        self.rules
            .iter()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(rule_id))
    }

    /// Ids of all declared rules, in declaration order.
    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_str()))
    }
}

/// The subset of a raw rule the compiler understands.
#[derive(Clone, Debug, Deserialize)]
pub struct RuleDeclaration {
    pub id: String,
    /// Path glob. Rules without a pattern only feed enforcement checks.
    #[serde(default, alias = "path_pattern")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub authority: Option<Authority>,
    #[serde(default)]
    pub severity: RuleSeverity,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

// ── Precedence ──────────────────────────────────────────────────────────

/// Ordered list of policy ids; earlier entries take precedence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedenceMap {
    #[serde(default)]
    pub precedence: Vec<String>,
}

impl PrecedenceMap {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            precedence: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Rank of `policy_id`. Unlisted policies rank after every listed one.
    pub fn rank(&self, policy_id: &str) -> usize {
        self.precedence
            .iter()
            .position(|p| p == policy_id)
            .unwrap_or(self.precedence.len())
    }
}

// ── Store ───────────────────────────────────────────────────────────────

/// Everything loaded from a policy directory.
#[derive(Clone, Debug, Default)]
pub struct PolicyStore {
    pub documents: Vec<PolicyDocument>,
    pub precedence: PrecedenceMap,
}

impl PolicyStore {
    pub fn new(documents: Vec<PolicyDocument>, precedence: PrecedenceMap) -> Self {
        Self {
            documents,
            precedence,
        }
    }

    /// Load every `*.yaml` / `*.yml` document under `dir`.
    ///
    /// Files are read in name order so declaration order is stable.
    pub fn load(dir: &Path) -> PolicyResult<Self> {
        if !dir.is_dir() {
            return Err(PolicyError::StoreNotFound(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(|source| PolicyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();
        paths.sort();

        let mut store = PolicyStore::default();
        for path in paths {
            let raw = std::fs::read_to_string(&path).map_err(|source| PolicyError::Io {
                path: path.clone(),
                source,
            })?;

            if path.file_name().and_then(|n| n.to_str()) == Some(PRECEDENCE_FILE) {
                store.precedence = parse_yaml(&path, &raw)?;
                continue;
            }

            let mut doc: PolicyDocument = parse_yaml(&path, &raw)?;
            if store.documents.iter().any(|d| d.id == doc.id) {
                return Err(PolicyError::DuplicatePolicy(doc.id));
            }
            debug!(policy = %doc.id, rules = doc.rules.len(), "loaded policy document");
            doc.source = Some(path);
            store.documents.push(doc);
        }

        info!(
            dir = %dir.display(),
            policies = store.documents.len(),
            "policy store loaded"
        );
        Ok(store)
    }
}

fn parse_yaml<T: serde::de::DeserializeOwned>(path: &Path, raw: &str) -> PolicyResult<T> {
    serde_yaml::from_str(raw).map_err(|e| PolicyError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
