//! Cryptographic approval engine.
//!
//! Approvers sign the proposal's approval token, not its content:
//!
//! ```text
//! content ──canonicalise──▶ blake3 ──▶ "v1:<hex>" ──ed25519──▶ signature_b64
//! ```
//!
//! Any change to the content changes the token, so every earlier
//! signature goes stale and stops counting. Signature problems never
//! raise; they show up as rejections in the [`VerificationReport`].

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use charter_types::{ApprovalToken, Proposal, Signature};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey, Verifier};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::ApproverRegistry;

// ── Verification Report ─────────────────────────────────────────────────

/// Why a signature did not count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Signed over an older token.
    Stale,
    /// Identity not in the approver registry.
    UnknownIdentity,
    /// Not valid base64 or not 64 bytes.
    Malformed,
    /// Did not verify under the identity's key.
    BadSignature,
    /// Identity already counted.
    Duplicate,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stale => "stale token",
            Self::UnknownIdentity => "unknown identity",
            Self::Malformed => "malformed signature",
            Self::BadSignature => "signature does not verify",
            Self::Duplicate => "duplicate identity",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub identity: String,
    pub reason: RejectionReason,
}

/// Outcome of checking every signature on a proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub valid_count: u32,
    /// Identities whose signatures counted.
    pub accepted: Vec<String>,
    pub rejected: Vec<Rejection>,
}

impl VerificationReport {
    pub fn stale_count(&self) -> usize {
        self.rejected
            .iter()
            .filter(|r| r.reason == RejectionReason::Stale)
            .count()
    }

    fn reject(&mut self, proposal: &str, identity: &str, reason: RejectionReason) {
        warn!(proposal = %proposal, identity = %identity, reason = %reason, "signature rejected");
        self.rejected.push(Rejection {
            identity: identity.to_string(),
            reason,
        });
    }
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Verifies signatures and computes quorum against an [`ApproverRegistry`].
#[derive(Clone, Debug)]
pub struct CryptoApprovalEngine {
    registry: Arc<ApproverRegistry>,
}

impl CryptoApprovalEngine {
    pub fn new(registry: Arc<ApproverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ApproverRegistry {
        &self.registry
    }

    /// Token approvers sign for `content`.
    pub fn approval_token(content: &str) -> ApprovalToken {
        ApprovalToken::for_content(content)
    }

    /// Count the valid, fresh, distinct signatures on `proposal`.
    pub fn verify(&self, proposal: &Proposal) -> VerificationReport {
        let token = proposal.approval_token();
        let mut report = VerificationReport::default();
        let mut counted = BTreeSet::new();

        for sig in &proposal.signatures {
            if !sig.is_fresh_for(&token) {
                report.reject(&proposal.name, &sig.identity, RejectionReason::Stale);
                continue;
            }
            if counted.contains(sig.identity.as_str()) {
                report.reject(&proposal.name, &sig.identity, RejectionReason::Duplicate);
                continue;
            }
            let Some(key) = self.registry.key(&sig.identity) else {
                report.reject(&proposal.name, &sig.identity, RejectionReason::UnknownIdentity);
                continue;
            };
            let Some(signature) = decode_signature(&sig.signature_b64) else {
                report.reject(&proposal.name, &sig.identity, RejectionReason::Malformed);
                continue;
            };
            if key.verify(token.as_bytes(), &signature).is_err() {
                report.reject(&proposal.name, &sig.identity, RejectionReason::BadSignature);
                continue;
            }

            counted.insert(sig.identity.as_str());
            report.accepted.push(sig.identity.clone());
            report.valid_count += 1;
        }

        debug!(
            proposal = %proposal.name,
            valid = report.valid_count,
            rejected = report.rejected.len(),
            "signatures verified"
        );
        report
    }

    /// Whether `target_path` falls under a critical path.
    pub fn is_critical(&self, target_path: &str) -> bool {
        self.registry.critical_paths().is_critical(target_path)
    }

    /// Signatures needed to approve a change to `target_path`.
    pub fn required_quorum(&self, target_path: &str) -> u32 {
        self.registry.quorum().required(self.is_critical(target_path))
    }

    /// Sign the current token of `proposal` as `identity`.
    pub fn sign(proposal: &Proposal, identity: &str, key: &SigningKey) -> Signature {
        let token = proposal.approval_token();
        let signature = key.sign(token.as_bytes());
        Signature {
            identity: identity.to_string(),
            signature_b64: STANDARD.encode(signature.to_bytes()),
            token: token.as_str().to_string(),
            timestamp: Utc::now(),
        }
    }
}

fn decode_signature(b64: &str) -> Option<ed25519_dalek::Signature> {
    let bytes = STANDARD.decode(b64.trim()).ok()?;
    ed25519_dalek::Signature::from_slice(&bytes).ok()
}
