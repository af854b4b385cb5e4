#[path = "adversarial/tampered_content.rs"]
mod tampered_content;

#[path = "adversarial/forged_signatures.rs"]
mod forged_signatures;

#[path = "adversarial/intent_escape.rs"]
mod intent_escape;

#[path = "adversarial/canary_isolation.rs"]
mod canary_isolation;

#[path = "adversarial/governance_state.rs"]
mod governance_state;
