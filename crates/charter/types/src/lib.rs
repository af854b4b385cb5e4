#![deny(unsafe_code)]
//! # charter-types
//!
//! Shared vocabulary for the Charter change-control engine.
//!
//! ```text
//!   proposed paths ──▶ IntentGuard ──▶ ValidationResult
//!                                          │
//!   Proposal + Signatures ──▶ CryptoApprovalEngine ──▶ quorum
//!                                          │
//!   Proposal ──▶ CanarySandbox ──▶ Findings ──▶ RollbackArchiver ──▶ live tree
//! ```
//!
//! Everything in this crate is plain data. Behaviour lives in the
//! component crates (`charter-policy`, `charter-approval`, ...).

pub mod finding;
pub mod policy;
pub mod proposal;
pub mod report;
pub mod token;

pub use finding::{AuditFinding, Finding, FindingSeverity};
pub use policy::{Authority, Impact, PolicyRule, RuleSeverity};
pub use proposal::{
    file_name_for, Proposal, Signature, PROPOSAL_FILE_PREFIX, PROPOSAL_FILE_SUFFIX,
};
pub use report::{ValidationResult, ViolationReport};
pub use token::{ApprovalToken, TokenError, TOKEN_VERSION};
