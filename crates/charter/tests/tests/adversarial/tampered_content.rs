//! Adversarial test: content edited after signing cannot ride on old
//! signatures, and never reaches a sandbox.

use std::sync::Arc;

use charter_lifecycle::{ApproveError, ProposalState};
use charter_tests::{signing_key, RecordingPipeline, TestRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn signed_then_swapped(repo: &TestRepo, name: &str, signed: &str, swapped: &str) {
    let alice = signing_key(1);
    repo.propose(name, "src/app.py", signed);
    repo.orchestrator().sign(name, "alice", &alice).unwrap();

    let store = repo.store();
    let mut proposal = store.load(name).unwrap();
    proposal.content = swapped.to_string();
    store.save(&proposal).unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn swapped_content_invalidates_every_signature() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    signed_then_swapped(&repo, "cr-100", "print('v2')\n", "import os; os.system('rm -rf /')\n");

    let pipeline = Arc::new(RecordingPipeline::passing());
    let orchestrator = repo.orchestrator_with(pipeline.clone());

    let status = orchestrator.list().unwrap().remove(0);
    assert_eq!(status.stale, 1);
    assert_eq!(status.valid_signatures, 0);
    assert_eq!(status.state, ProposalState::Pending);

    let err = orchestrator.approve("cr-100").await.unwrap_err();
    assert!(matches!(
        err,
        ApproveError::QuorumNotMet {
            valid: 0,
            required: 1,
            ..
        }
    ));
    assert_eq!(pipeline.calls(), 0);
    assert!(!repo.sandbox_path("cr-100").exists());
    assert_eq!(repo.read("src/app.py"), "print('v1')\n");
}

#[tokio::test]
async fn single_byte_edit_is_enough_to_go_stale() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    signed_then_swapped(&repo, "cr-101", "LIMIT = 10\n", "LIMIT = 100\n");

    let orchestrator = repo.orchestrator();
    assert!(orchestrator.approve("cr-101").await.is_err());

    // A fresh signature over the edited content restores quorum.
    orchestrator.sign("cr-101", "alice", &alice).unwrap();
    orchestrator.approve("cr-101").await.unwrap();
    assert_eq!(repo.read("src/app.py"), "LIMIT = 100\n");
}

#[tokio::test]
async fn line_ending_rewrite_is_not_tampering() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    signed_then_swapped(&repo, "cr-102", "a = 1\nb = 2\n", "a = 1\r\nb = 2\r\n");

    let orchestrator = repo.orchestrator();
    assert_eq!(orchestrator.list().unwrap()[0].stale, 0);
    orchestrator.approve("cr-102").await.unwrap();
}
