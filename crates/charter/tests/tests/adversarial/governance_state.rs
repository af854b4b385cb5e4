//! Adversarial test: the engine's own state (approvers, quorum, critical
//! paths, policies, proposals, rollback archive, config) is out of reach
//! of any proposal, however well signed.

use charter_lifecycle::{ApproveError, ARCHIVE_FILE};
use charter_policy::HARD_INVARIANT_RULE;
use charter_tests::{signing_key, TestRepo};
use charter_types::Authority;

fn repo() -> TestRepo {
    TestRepo::new().with_approvers(&[("alice", &signing_key(1))], 1, 2)
}

async fn assert_refused(repo: &TestRepo, name: &str, target: &str, content: &str) {
    repo.propose(name, target, content);
    let orchestrator = repo.orchestrator();
    orchestrator.sign(name, "alice", &signing_key(1)).unwrap();

    match orchestrator.approve(name).await {
        Err(ApproveError::PolicyViolation { violations, .. }) => {
            assert_eq!(violations[0].rule_name, HARD_INVARIANT_RULE, "target {target}");
            assert_eq!(violations[0].authority, Authority::HardInvariant);
        }
        other => panic!("target {target} was not refused: {other:?}"),
    }
}

#[tokio::test]
async fn rollback_archive_cannot_be_wiped() {
    let repo = repo();
    repo.propose("cr-150", "src/app.py", "print('v2')\n");
    let orchestrator = repo.orchestrator();
    orchestrator.sign("cr-150", "alice", &signing_key(1)).unwrap();
    orchestrator.approve("cr-150").await.unwrap();

    let archive = format!(".charter/rollbacks/{ARCHIVE_FILE}");
    let before = repo.read(&archive);
    assert_refused(&repo, "cr-151", &archive, "").await;
    assert_refused(&repo, "cr-152", "./.charter/rollbacks/../rollbacks/rollbacks.jsonl", "").await;

    assert_eq!(repo.read(&archive), before);
    assert_eq!(repo.archiver().records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn approver_set_and_quorum_cannot_be_rewritten() {
    let repo = repo();
    let approvers = repo.read(".charter/approvers.yaml");

    assert_refused(&repo, "cr-153", ".charter/approvers.yaml", "approvers: []\n").await;
    assert_refused(&repo, "cr-154", ".charter/critical_paths.yaml", "paths: []\n").await;
    assert_refused(&repo, "cr-155", "charter.toml", "strict_mode = false\n").await;

    assert_eq!(repo.read(".charter/approvers.yaml"), approvers);
    assert!(!repo.exists(".charter/critical_paths.yaml"));
    assert!(!repo.exists("charter.toml"));
}

#[tokio::test]
async fn policies_and_pending_proposals_cannot_be_rewritten() {
    let repo = repo();
    let constitution = repo.read(".charter/policies/constitution.yaml");
    repo.propose("cr-156", "src/app.py", "print('queued')\n");
    let queued = repo.read(".charter/proposals/cr-156.yaml");

    assert_refused(&repo, "cr-157", ".charter/policies/constitution.yaml", "rules: []\n").await;
    assert_refused(&repo, "cr-158", ".charter/proposals/cr-156.yaml", "target_path: x\n").await;
    assert_refused(&repo, "cr-159", ".charter/sandbox/cr-156/src/app.py", "x\n").await;

    assert_eq!(repo.read(".charter/policies/constitution.yaml"), constitution);
    assert_eq!(repo.read(".charter/proposals/cr-156.yaml"), queued);
}

#[tokio::test]
async fn relocated_state_is_protected_where_it_lives() {
    let repo = TestRepo::new()
        .with_config(|c| c.archive_dir = "var/audit".into())
        .with_approvers(&[("alice", &signing_key(1))], 1, 2);
    assert_refused(&repo, "cr-160", &format!("var/audit/{ARCHIVE_FILE}"), "").await;
    // The default location is ordinary repository content once moved.
    repo.propose("cr-161", ".charter/rollbacks/notes.md", "moved\n");
    let orchestrator = repo.orchestrator();
    orchestrator.sign("cr-161", "alice", &signing_key(1)).unwrap();
    orchestrator.approve("cr-161").await.unwrap();
}
