#![deny(unsafe_code)]
//! # charter-approval
//!
//! Multi-party cryptographic approval for change proposals.
//!
//! ```text
//! ProposalStore ──load──▶ Proposal ──verify──▶ VerificationReport
//!                                                  │
//!                     ApproverRegistry ──quorum────┴──▶ valid ≥ required ?
//! ```
//!
//! - [`ProposalStore`]: one `cr-*.yaml` file per pending proposal
//! - [`ProposalLock`]: per-proposal lock file for sign/approve
//! - [`ApproverRegistry`]: identity → ed25519 key, quorum modes, critical paths
//! - [`CryptoApprovalEngine`]: token, verification, quorum, signing

pub mod engine;
pub mod error;
pub mod keys;
pub mod lock;
pub mod registry;
pub mod store;

pub use engine::{CryptoApprovalEngine, Rejection, RejectionReason, VerificationReport};
pub use error::{ApprovalError, ApprovalResult};
pub use keys::{generate_signing_key, load_signing_key, public_key_pem, signing_key_pem};
pub use lock::ProposalLock;
pub use registry::{
    parse_public_key, ApproverConfig, ApproverEntry, ApproverRegistry, CriticalPathSet,
    CriticalPathsConfig, QuorumConfig, QuorumThresholds, DEFAULT_QUORUM,
};
pub use store::{write_atomic, ProposalStore};

pub use ed25519_dalek::{SigningKey, VerifyingKey};
