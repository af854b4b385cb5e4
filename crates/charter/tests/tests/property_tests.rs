#[path = "property/token_determinism.rs"]
mod token_determinism;

#[path = "property/hard_invariant.rs"]
mod hard_invariant;

#[path = "property/quorum_counting.rs"]
mod quorum_counting;
