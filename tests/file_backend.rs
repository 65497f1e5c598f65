mod support;

use boardsync::backend::{FileBackend, ListProvider, PositionEndpoint};
use boardsync::board::Board;
use boardsync::config::Config;
use boardsync::drag::DragTarget;
use boardsync::entity::EntityKind;
use boardsync::error::Error;
use boardsync::lock::{lock_path_for, FileLock};
use boardsync::reconcile::{PositionBatch, PositionUpdate};
use boardsync::scope::ScopeKey;

use support::{ids, TestBoardDir};

#[tokio::test]
async fn fetch_orders_tasks_by_column_then_position() {
    let dir = TestBoardDir::new();
    let backend = FileBackend::new(dir.board_path());

    let tasks = backend.fetch(&ScopeKey::tasks("ws1")).await.unwrap();
    assert_eq!(ids(&tasks), vec!["t1", "t2", "t3", "t4"]);
    let bugs = backend
        .fetch(&ScopeKey::tasks("ws1").with("tag", "bug"))
        .await
        .unwrap();
    assert_eq!(ids(&bugs), vec!["t1", "t3"]);
}

#[tokio::test]
async fn batch_with_unknown_id_changes_nothing() {
    let dir = TestBoardDir::new();
    let backend = FileBackend::new(dir.board_path());
    let batch = PositionBatch {
        kind: EntityKind::Column,
        scope: ScopeKey::columns("ws1"),
        updates: vec![
            PositionUpdate {
                id: "T2".to_string(),
                position: 0,
                container_id: None,
            },
            PositionUpdate {
                id: "T9".to_string(),
                position: 1,
                container_id: None,
            },
        ],
    };

    let err = backend.update_positions(&batch).await.unwrap_err();
    assert!(matches!(err, Error::EntityNotFound(_)));
    assert_eq!(dir.read_document(), support::sample_document());
}

#[tokio::test]
async fn held_lock_times_out_writes() {
    let dir = TestBoardDir::new();
    let backend = FileBackend::new(dir.board_path()).with_lock_timeout(50);
    let _held = FileLock::acquire(lock_path_for(&dir.board_path()), 1000).unwrap();

    let batch = PositionBatch {
        kind: EntityKind::Workspace,
        scope: ScopeKey::workspaces(),
        updates: Vec::new(),
    };
    let err = backend.update_positions(&batch).await.unwrap_err();
    assert!(matches!(err, Error::LockFailed(_)));
}

#[tokio::test]
async fn board_over_file_persists_column_reorder() {
    let dir = TestBoardDir::new();
    let board = Board::new(FileBackend::new(dir.board_path()), &Config::default()).unwrap();
    let scope = ScopeKey::columns("ws1");
    let mut list = board.sortable(scope.clone());
    list.load().await.unwrap();

    list.on_drag_start("T1");
    list.on_drag_over(
        "T1",
        &DragTarget::Entity {
            id: "T3".to_string(),
            kind: EntityKind::Column,
        },
    );
    let outcome = list.on_drag_end().await.unwrap();
    assert!(outcome.batch().is_some());

    let doc = dir.read_document();
    let mut columns = doc.boards["ws1"].columns.clone();
    columns.sort_by_key(|c| c.position);
    assert_eq!(ids(&columns), vec!["T2", "T3", "T1"]);

    board.refresh().await.unwrap();
    assert_eq!(ids(&board.read(&scope).await.unwrap()), vec!["T2", "T3", "T1"]);
}
