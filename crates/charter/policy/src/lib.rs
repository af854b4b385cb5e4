#![deny(unsafe_code)]
//! # charter-policy
//!
//! Authority-tiered rule matching over proposed paths.
//!
//! - [`PolicyStore`] loads policy documents and the precedence map.
//! - [`PolicyCompiler`] produces totally ordered [`PolicyRule`](charter_types::PolicyRule)s.
//! - [`IntentGuard`] evaluates a transaction's paths and returns a
//!   tiered [`ValidationResult`](charter_types::ValidationResult).
//! - [`PolicyRegistry`] is the in-memory source of truth consumed by
//!   enforcement checks.
//!
//! ## Tiers
//!
//! | Authority        | Blocks when                              |
//! |------------------|------------------------------------------|
//! | hard invariant   | always (path under the intent root)      |
//! | constitutional   | always                                   |
//! | policy           | strict mode and rule severity `blocking` |

pub mod compiler;
pub mod error;
pub mod guard;
pub mod path;
pub mod registry;
pub mod store;

pub use compiler::{PolicyCompiler, DEFAULT_STATIC_ANALYSIS_ENGINES};
pub use error::{PolicyError, PolicyResult};
pub use guard::{GuardConfig, IntentGuard, DEFAULT_INTENT_ROOT, HARD_INVARIANT_RULE};
pub use registry::PolicyRegistry;
pub use store::{PolicyDocument, PolicyStore, PrecedenceMap, RuleDeclaration, PRECEDENCE_FILE};
