#![deny(unsafe_code)]
//! # charter-enforcement
//!
//! The uniform seam every policy check plugs into:
//!
//! ```text
//! rule id ──▶ [strategy, strategy, ...] ──▶ findings
//! ```
//!
//! A check declares rule ids (or infers them from its strategy
//! bindings), resolves its owning policy from the in-memory
//! [`PolicyRegistry`](charter_policy::PolicyRegistry), and never
//! silently passes when that data is missing.

pub mod builtin;
pub mod error;
pub mod strategy;
pub mod template;

pub use builtin::{ForbiddenPathStrategy, RequiredFileStrategy};
pub use error::{StrategyError, StrategyResult};
pub use strategy::{
    AsyncStrategy, StrategyContext, StrategyRegistry, SyncStrategy, VerificationStrategy,
};
pub use template::{
    CheckSuite, EnforcementCheck, POLICY_MISSING, RULE_NOT_DECLARED, STRATEGY_FAILED,
};
