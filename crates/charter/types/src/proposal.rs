//! Pending change proposals and approver signatures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::ApprovalToken;

/// Proposal files are named `cr-<id>.yaml`.
pub const PROPOSAL_FILE_PREFIX: &str = "cr-";
pub const PROPOSAL_FILE_SUFFIX: &str = ".yaml";

// ── Signature ───────────────────────────────────────────────────────────

/// An approver's signature over a proposal's approval token.
///
/// Only counts toward quorum while `token` equals the token of the
/// proposal's *current* content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Registered approver identity.
    pub identity: String,
    /// Base64 ed25519 signature over the token string.
    pub signature_b64: String,
    /// Token the signer saw when signing.
    pub token: String,
    /// When the signature was produced.
    pub timestamp: DateTime<Utc>,
}

impl Signature {
    /// Whether this signature was made over `token`.
    pub fn is_fresh_for(&self, token: &ApprovalToken) -> bool {
        self.token == token.as_str()
    }
}

// ── Proposal ────────────────────────────────────────────────────────────

/// A pending change to protected state.
///
/// Mutated only by adding or replacing a signer's [`Signature`]; removed
/// from the store once applied or withdrawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal name (file stem, e.g. `cr-001`). Filled from the file name on load.
    #[serde(default)]
    pub name: String,
    /// Repository-relative path the content will be written to.
    #[serde(default)]
    pub target_path: Option<String>,
    /// Full replacement content for the target.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    /// Free-form rollback plan, archived before the change goes live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_plan: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Proposal {
    /// Create an unsigned proposal.
    pub fn new(
        name: impl Into<String>,
        target_path: impl Into<String>,
        content: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_path: Some(target_path.into()),
            content: content.into(),
            justification: justification.into(),
            signatures: Vec::new(),
            rollback_plan: None,
            proposer: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn with_rollback_plan(mut self, plan: serde_json::Value) -> Self {
        self.rollback_plan = Some(plan);
        self
    }

    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = Some(proposer.into());
        self
    }

    /// Approval token of the current content.
    pub fn approval_token(&self) -> ApprovalToken {
        ApprovalToken::for_content(&self.content)
    }

    /// Add `signature`, replacing any earlier signature by the same identity.
    pub fn upsert_signature(&mut self, signature: Signature) {
        match self
            .signatures
            .iter_mut()
            .find(|s| s.identity == signature.identity)
        {
            Some(existing) => *existing = signature,
            None => self.signatures.push(signature),
        }
    }

    /// Signatures whose token no longer matches the content.
    pub fn stale_signatures(&self) -> impl Iterator<Item = &Signature> {
        let token = self.approval_token();
        self.signatures
            .iter()
            .filter(move |s| !s.is_fresh_for(&token))
    }

    /// File name for this proposal inside a proposals directory.
    pub fn file_name(&self) -> String {
        file_name_for(&self.name)
    }
}

/// File name for a proposal name, accepting names with or without suffix.
pub fn file_name_for(name: &str) -> String {
    if name.ends_with(PROPOSAL_FILE_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{PROPOSAL_FILE_SUFFIX}")
    }
}
