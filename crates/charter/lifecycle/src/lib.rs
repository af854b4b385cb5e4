#![deny(unsafe_code)]
//! # charter-lifecycle
//!
//! Ties policy, approval, canary and archive together into the proposal
//! lifecycle.
//!
//! - [`ProposalLifecycleOrchestrator`]: list, sign, withdraw, approve
//! - [`RollbackArchiver`]: durable, append-only rollback records
//! - [`EngineConfig`]: `charter.toml` loading
//!
//! ## Invariants
//!
//! | Guarantee                       | Enforced by                          |
//! |---------------------------------|--------------------------------------|
//! | intent root never written       | intent guard before quorum           |
//! | stale signatures never count    | approval token over current content  |
//! | no sandbox without quorum       | quorum check precedes the canary     |
//! | live tree untouched on failure  | canary runs in a copy                |
//! | rollback record before change   | archive fsync precedes atomic rename |

pub mod archive;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use archive::{RollbackArchiver, RollbackRecord, ARCHIVE_FILE};
pub use config::{EngineConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
pub use error::{
    ApproveError, ArchiveError, ArchiveResult, ConfigError, LifecycleError, LifecycleResult,
};
pub use orchestrator::{ApproveOutcome, ProposalLifecycleOrchestrator, ProposalState, ProposalStatus};
