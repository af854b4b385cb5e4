//! Adversarial test: no spelling of a target path reaches the
//! constitutional-intent root or leaves the repository.
//!
//! Every attempt is fully signed, so only the intent guard stands in the way.

use std::sync::Arc;

use charter_lifecycle::ApproveError;
use charter_policy::HARD_INVARIANT_RULE;
use charter_tests::{signing_key, RecordingPipeline, TestRepo};
use charter_types::Authority;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn assert_blocked(repo: &TestRepo, name: &str, target: &str) {
    let alice = signing_key(1);
    repo.propose(name, target, "principles: [anything goes]\n");
    let pipeline = Arc::new(RecordingPipeline::passing());
    let orchestrator = repo.orchestrator_with(pipeline.clone());
    orchestrator.sign(name, "alice", &alice).unwrap();

    let before = repo.snapshot();
    match orchestrator.approve(name).await {
        Err(ApproveError::PolicyViolation { violations, .. }) => {
            assert_eq!(violations.len(), 1, "target {target}");
            assert_eq!(violations[0].rule_name, HARD_INVARIANT_RULE);
            assert_eq!(violations[0].authority, Authority::HardInvariant);
        }
        other => panic!("target {target} was not blocked: {other:?}"),
    }
    assert_eq!(pipeline.calls(), 0, "target {target} reached the canary");
    assert_eq!(repo.snapshot(), before, "target {target} touched the tree");
    assert!(repo.archiver().records().await.unwrap().is_empty());
}

fn repo() -> TestRepo {
    TestRepo::new().with_approvers(&[("alice", &signing_key(1))], 1, 2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_intent_target_is_blocked() {
    let repo = repo();
    assert_blocked(&repo, "cr-120", ".intent/constitution/core.yaml").await;
    assert_eq!(repo.read(".intent/constitution/core.yaml"), "principles: []\n");
}

#[tokio::test]
async fn alternate_spellings_are_normalised_first() {
    let repo = repo();
    assert_blocked(&repo, "cr-121", "./.intent/constitution/core.yaml").await;
    assert_blocked(&repo, "cr-122", "src/../.intent/constitution/core.yaml").await;
    assert_blocked(&repo, "cr-123", "src/./governance/../../.intent/new.yaml").await;
    assert_blocked(&repo, "cr-124", ".intent").await;
    assert_blocked(&repo, "cr-130", ".intent\\constitution\\core.yaml").await;
}

#[tokio::test]
async fn absolute_path_into_intent_is_blocked() {
    let repo = repo();
    let target = repo.root().join(".intent/constitution/core.yaml");
    assert_blocked(&repo, "cr-125", &target.to_string_lossy()).await;
}

#[tokio::test]
async fn escaping_the_repository_is_blocked() {
    let repo = repo();
    let outside = format!(
        "charter-escape-{}.txt",
        repo.root().file_name().unwrap().to_string_lossy()
    );
    assert_blocked(&repo, "cr-126", &format!("../{outside}")).await;
    assert_blocked(&repo, "cr-127", &format!("src/../../{outside}")).await;
    assert!(!repo.root().parent().unwrap().join(&outside).exists());
}

#[tokio::test]
async fn configured_intent_root_is_protected() {
    let repo = TestRepo::new()
        .with_config(|c| c.intent_root = "governance/intent".into())
        .with_approvers(&[("alice", &signing_key(1))], 1, 2);
    assert_blocked(&repo, "cr-128", "governance/intent/charter.md").await;
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directory_into_intent_is_blocked() {
    let repo = repo();
    std::os::unix::fs::symlink(
        repo.root().join(".intent/constitution"),
        repo.root().join("src/docs"),
    )
    .unwrap();
    assert_blocked(&repo, "cr-131", "src/docs/core.yaml").await;
    assert_blocked(&repo, "cr-132", "src/docs/new.yaml").await;
    assert_eq!(repo.read(".intent/constitution/core.yaml"), "principles: []\n");
    assert!(!repo.exists(".intent/constitution/new.yaml"));
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_file_into_intent_is_blocked() {
    let repo = repo();
    std::os::unix::fs::symlink(
        repo.root().join(".intent/constitution/core.yaml"),
        repo.root().join("src/core.yaml"),
    )
    .unwrap();
    assert_blocked(&repo, "cr-133", "src/core.yaml").await;
    assert_eq!(repo.read(".intent/constitution/core.yaml"), "principles: []\n");
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_out_of_the_repository_is_blocked() {
    let repo = repo();
    let outside = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(outside.path(), repo.root().join("src/vendor")).unwrap();
    assert_blocked(&repo, "cr-134", "src/vendor/lib.py").await;
    assert!(!outside.path().join("lib.py").exists());
}

#[tokio::test]
async fn lookalike_paths_are_not_intent() {
    let alice = signing_key(1);
    let repo = repo();
    repo.propose("cr-129", ".intentional/notes.md", "not protected\n");
    let orchestrator = repo.orchestrator();
    orchestrator.sign("cr-129", "alice", &alice).unwrap();
    orchestrator.approve("cr-129").await.unwrap();
    assert_eq!(repo.read(".intentional/notes.md"), "not protected\n");
}
