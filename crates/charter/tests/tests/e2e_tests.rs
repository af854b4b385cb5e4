#[path = "e2e/proposal_lifecycle.rs"]
mod proposal_lifecycle;

#[path = "e2e/policy_enforcement.rs"]
mod policy_enforcement;

#[path = "e2e/rollback_archive.rs"]
mod rollback_archive;
