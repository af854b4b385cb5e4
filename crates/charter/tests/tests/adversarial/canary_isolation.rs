//! Adversarial test: whatever the canary finds, the live tree only changes
//! after a clean run, and the audit only ever sees the sandbox copy.

use std::sync::Arc;

use charter_canary::AUDIT_COMMAND_FAILED;
use charter_lifecycle::ApproveError;
use charter_tests::{signing_key, RecordingPipeline, TestRepo};
use charter_types::Finding;

fn signed(repo: &TestRepo, name: &str, content: &str) {
    repo.propose(name, "src/app.py", content);
    repo.orchestrator().sign(name, "alice", &signing_key(1)).unwrap();
}

fn repo() -> TestRepo {
    TestRepo::new().with_approvers(&[("alice", &signing_key(1))], 1, 2)
}

#[tokio::test]
async fn audit_sees_the_proposed_content_in_a_copy() {
    let repo = repo();
    signed(&repo, "cr-140", "print('v2')\n");
    let pipeline = Arc::new(RecordingPipeline::passing().observing("src/app.py"));

    repo.orchestrator_with(pipeline.clone())
        .approve("cr-140")
        .await
        .unwrap();

    let seen = pipeline.seen();
    assert_eq!(seen.len(), 1);
    let (root, observed) = &seen[0];
    assert_eq!(root, &repo.sandbox_path("cr-140"));
    assert_ne!(root, repo.root());
    assert_eq!(observed.as_deref(), Some("print('v2')\n"));
    assert!(!root.exists());
}

#[tokio::test]
async fn failed_canary_leaves_live_tree_and_proposal_alone() {
    let repo = repo();
    signed(&repo, "cr-141", "print('broken')\n");
    let before = repo.snapshot();
    let pipeline = Arc::new(RecordingPipeline::failing("3 tests failed"));

    let err = repo
        .orchestrator_with(pipeline.clone())
        .approve("cr-141")
        .await
        .unwrap_err();

    let ApproveError::CanaryFailed {
        findings,
        sandbox_path,
        ..
    } = &err
    else {
        panic!("expected canary failure, got {err:?}");
    };
    assert!(findings.iter().any(|f| f.is_blocking()));
    assert_eq!(
        std::fs::read_to_string(sandbox_path.join("src/app.py")).unwrap(),
        "print('broken')\n"
    );

    assert_eq!(repo.snapshot(), before);
    assert!(repo.archiver().records().await.unwrap().is_empty());
    assert!(repo.store().load("cr-141").is_ok());
}

#[tokio::test]
async fn warnings_do_not_fail_the_canary() {
    let repo = repo();
    signed(&repo, "cr-142", "print('v2')  # noqa\n");
    let pipeline = Arc::new(
        RecordingPipeline::passing().with_finding(Finding::warning("lint", "line too long")),
    );

    let outcome = repo.orchestrator_with(pipeline).approve("cr-142").await.unwrap();
    assert_eq!(outcome.canary_findings.len(), 1);
    assert_eq!(repo.read("src/app.py"), "print('v2')  # noqa\n");
}

#[tokio::test]
async fn retry_after_failure_starts_from_a_fresh_sandbox() {
    let repo = repo();
    signed(&repo, "cr-143", "print('v2')\n");

    let failing = Arc::new(RecordingPipeline::failing("flaky"));
    assert!(repo.orchestrator_with(failing).approve("cr-143").await.is_err());
    let leftover = repo.sandbox_path("cr-143").join("left-by-debugging.txt");
    std::fs::write(&leftover, "scratch").unwrap();

    let passing = Arc::new(RecordingPipeline::passing().observing("left-by-debugging.txt"));
    repo.orchestrator_with(passing.clone())
        .approve("cr-143")
        .await
        .unwrap();

    assert_eq!(passing.seen()[0].1, None);
    assert_eq!(repo.read("src/app.py"), "print('v2')\n");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_audit_command_blocks_even_when_it_only_warns() {
    let repo = TestRepo::new()
        .with_config(|c| c.audit_command = Some("sh audit.sh".into()))
        .with_approvers(&[("alice", &signing_key(1))], 1, 2);
    repo.write(
        "audit.sh",
        "echo '{\"severity\": \"warning\", \"message\": \"suite crashed\"}'\nexit 1\n",
    );
    signed(&repo, "cr-145", "print('v2')\n");

    let err = repo.orchestrator().approve("cr-145").await.unwrap_err();
    let ApproveError::CanaryFailed { findings, .. } = &err else {
        panic!("expected canary failure, got {err:?}");
    };
    assert_eq!(findings.len(), 2);
    assert_eq!(findings.iter().filter(|f| f.is_blocking()).count(), 1);
    assert!(findings
        .iter()
        .any(|f| f.summary().contains(AUDIT_COMMAND_FAILED)));
    assert_eq!(repo.read("src/app.py"), "print('v1')\n");
    assert!(repo.archiver().records().await.unwrap().is_empty());
}

#[tokio::test]
async fn heavy_directories_are_not_copied() {
    let repo = repo();
    repo.write(".git/HEAD", "ref: refs/heads/main\n");
    repo.write("target/debug/app", "binary");
    signed(&repo, "cr-144", "print('v2')\n");

    let git = Arc::new(RecordingPipeline::passing().observing(".git/HEAD"));
    repo.orchestrator_with(git.clone()).approve("cr-144").await.unwrap();
    assert_eq!(git.seen()[0].1, None);
}
