#![deny(unsafe_code)]
//! # charter-canary
//!
//! Runs a proposal against a sandbox copy of the repository before it is
//! allowed anywhere near the live tree.
//!
//! - [`CanarySandbox`]: copy, apply in copy, audit, classify
//! - [`AuditPipeline`]: the validation seam
//!   ([`CommandAuditPipeline`] for real runs, [`StaticAuditPipeline`] for tests)
//! - [`SandboxGuard`]: removes the sandbox unless the run failed

pub mod error;
pub mod pipeline;
pub mod sandbox;

pub use error::{CanaryError, SandboxResult};
pub use pipeline::{
    parse_findings, AuditPipeline, CommandAuditPipeline, StaticAuditPipeline, AUDIT_COMMAND_FAILED,
};
pub use sandbox::{CanaryResult, CanarySandbox, SandboxGuard, DEFAULT_EXCLUDES};
