//! Board moves while the store is slow

use lumen_sdk::gateway::FailureKind;
use lumen_sdk::{
    BoardColumn, BypassIdentity, MockGateway, MutationOutcome, ProjectBoard, RecordingNotifier,
    Role, SdkError,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const OWNER: &str = "7f9c2d2e-4c1b-4f53-9f0e-0d6f7b1c2a11";
const WEDDING: &str = "2b1e4c0a-9a63-4d8e-8f57-5b8a1c3f9d01";
const MOVE_KEY: &str = "rpc:update_project_status";

fn studio() -> Arc<MockGateway> {
    let gateway = MockGateway::new()
        .with_rows(
            "projects",
            vec![json!({
                "id": WEDDING,
                "title": "Mehta wedding",
                "status": "upcoming",
                "user_id": OWNER,
                "created_at": "2024-03-01T10:00:00Z"
            })],
        )
        .with_rpc("update_project_status", |tables, args| {
            let rows = tables.entry("projects".to_string()).or_default();
            let row = rows
                .iter_mut()
                .find(|r| r["id"] == args["p_project_id"])
                .ok_or_else(|| SdkError::NotFound("project".into()))?;
            row["status"] = args["p_status"].clone();
            Ok(json!({"success": true, "data": row.clone()}))
        });
    Arc::new(gateway)
}

fn board(gateway: Arc<MockGateway>, notifier: Arc<RecordingNotifier>) -> ProjectBoard {
    ProjectBoard::new(
        gateway,
        Arc::new(BypassIdentity::new(Uuid::parse_str(OWNER).unwrap(), Role::Owner)),
        notifier,
    )
}

fn wedding() -> Uuid {
    Uuid::parse_str(WEDDING).unwrap()
}

#[tokio::test]
async fn test_second_drag_while_saving_is_ignored() {
    let gateway = studio();
    let board = board(gateway.clone(), Arc::new(RecordingNotifier::new()));
    board.load().await.unwrap();
    gateway.hold(MOVE_KEY);

    let first = board.move_project(wedding(), BoardColumn::Shoot);
    let second = async {
        // The patch is visible before the store answers
        assert_eq!(board.column_of(wedding()), Some(BoardColumn::Shoot));
        let outcome = board
            .move_project(wedding(), BoardColumn::PostProduction)
            .await
            .unwrap();
        gateway.release(MOVE_KEY);
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), MutationOutcome::Committed(BoardColumn::Shoot));
    assert_eq!(second, MutationOutcome::Ignored);
    assert_eq!(gateway.call_count(MOVE_KEY), 1);
    assert_eq!(gateway.rows("projects")[0]["status"], "shoot");
}

#[tokio::test]
async fn test_failure_after_detach_is_silent() {
    let gateway = studio();
    let notifier = Arc::new(RecordingNotifier::new());
    let board = board(gateway.clone(), notifier.clone());
    board.load().await.unwrap();
    gateway.hold(MOVE_KEY);
    gateway.fail_next(MOVE_KEY, FailureKind::Network);

    let moving = board.move_project(wedding(), BoardColumn::Delivered);
    let leave = async {
        board.detach();
        gateway.release(MOVE_KEY);
    };
    let (outcome, ()) = tokio::join!(moving, leave);

    assert_eq!(outcome.unwrap(), MutationOutcome::Stale);
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn test_rollback_then_reconcile_matches_store() {
    let gateway = studio();
    let notifier = Arc::new(RecordingNotifier::new());
    let board = board(gateway.clone(), notifier.clone());
    board.load().await.unwrap();

    gateway.fail_next(
        MOVE_KEY,
        FailureKind::Rpc {
            code: Some("42501".into()),
            message: "permission denied".into(),
        },
    );
    assert!(board
        .move_project(wedding(), BoardColumn::Delivered)
        .await
        .is_err());
    assert_eq!(board.column_of(wedding()), Some(BoardColumn::Upcoming));
    assert_eq!(notifier.errors().len(), 1);

    board.move_project(wedding(), BoardColumn::Delivered).await.unwrap();
    board.reconcile().await.unwrap();
    assert_eq!(board.column_of(wedding()), Some(BoardColumn::Delivered));
    assert_eq!(
        board.project(wedding()).unwrap().status.as_deref(),
        Some("delivered")
    );
}
