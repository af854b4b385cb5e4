//! Subcommand implementations.

pub mod keys;
pub mod policy;
pub mod proposal;
