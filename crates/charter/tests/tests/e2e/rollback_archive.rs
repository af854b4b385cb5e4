//! End-to-end: every applied change leaves a rollback record describing
//! the state it replaced.

use std::time::SystemTime;

use charter_lifecycle::ARCHIVE_FILE;
use charter_tests::{signing_key, TestRepo};
use charter_types::ApprovalToken;

#[tokio::test]
async fn record_captures_previous_and_approved_content() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    repo.propose("cr-030", "src/app.py", "print('v2')\n");
    let orchestrator = repo.orchestrator();
    orchestrator.sign("cr-030", "alice", &alice).unwrap();

    let outcome = orchestrator.approve("cr-030").await.unwrap();

    let records = repo.archiver().records_for("cr-030").await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record, &outcome.rollback);
    assert_eq!(record.target_path, "src/app.py");
    assert_eq!(record.justification, "integration test change");
    assert_eq!(
        record.previous_content_hash.as_deref(),
        Some(ApprovalToken::for_content("print('v1')\n").as_str())
    );
    assert_eq!(
        record.approval_token,
        ApprovalToken::for_content("print('v2')\n").to_string()
    );
    assert!(record.rollback_plan.is_some());
}

#[tokio::test]
async fn record_is_written_before_the_live_file_changes() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    repo.propose("cr-034", "src/app.py", "print('v2')\n");
    let orchestrator = repo.orchestrator();
    orchestrator.sign("cr-034", "alice", &alice).unwrap();

    let outcome = orchestrator.approve("cr-034").await.unwrap();

    let modified = std::fs::metadata(&outcome.applied_path)
        .unwrap()
        .modified()
        .unwrap();
    let archived = SystemTime::from(outcome.rollback.archived_at);
    assert!(archived < modified);
    let archive_written = std::fs::metadata(repo.root().join(".charter/rollbacks").join(ARCHIVE_FILE))
        .unwrap()
        .modified()
        .unwrap();
    assert!(archive_written <= modified);
    // The record describes the file as it was before the write.
    assert_eq!(
        outcome.rollback.previous_content_hash.as_deref(),
        Some(ApprovalToken::for_content("print('v1')\n").as_str())
    );
}

#[tokio::test]
async fn archive_only_grows() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    let orchestrator = repo.orchestrator();

    for (i, content) in ["a = 1\n", "a = 2\n", "a = 3\n"].iter().enumerate() {
        let name = format!("cr-03{}", i + 1);
        repo.propose(&name, "src/settings.py", content);
        orchestrator.sign(&name, "alice", &alice).unwrap();
        orchestrator.approve(&name).await.unwrap();
    }

    let records = repo.archiver().records().await.unwrap();
    let names: Vec<_> = records.iter().map(|r| r.proposal_name.as_str()).collect();
    assert_eq!(names, ["cr-031", "cr-032", "cr-033"]);
    assert!(records[0].previous_content_hash.is_none());
    assert_eq!(
        records[2].previous_content_hash.as_deref(),
        Some(ApprovalToken::for_content("a = 2\n").as_str())
    );

    let raw = std::fs::read_to_string(repo.root().join(".charter/rollbacks").join(ARCHIVE_FILE)).unwrap();
    assert_eq!(raw.lines().count(), 3);
    assert_eq!(repo.read("src/settings.py"), "a = 3\n");
}

#[tokio::test]
async fn rejected_proposals_leave_no_record() {
    let alice = signing_key(1);
    let repo = TestRepo::new().with_approvers(&[("alice", &alice)], 1, 2);
    repo.propose("cr-035", "src/app.py", "print('unsigned')\n");

    assert!(repo.orchestrator().approve("cr-035").await.is_err());
    assert!(repo.archiver().records().await.unwrap().is_empty());
}
