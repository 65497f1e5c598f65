use boardsync::entity::EntityKind;
use boardsync::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let blocked = Error::ScopeUnresolved {
        kind: EntityKind::Task,
    };
    assert_eq!(blocked.exit_code(), exit_codes::POLICY_BLOCKED);

    let op = Error::PersistFailed("server said no".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code() {
    let err = Error::EntityNotFound("task t9".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Entity not found"));
    assert_eq!(json.kind, "entity_not_found");
    assert!(json.hint.is_none());

    let locked = JsonError::from(&Error::LockFailed("board.json.lock".into()));
    assert_eq!(locked.code, exit_codes::OPERATION_FAILED);
    assert!(locked.hint.unwrap().contains("retry"));
}

#[test]
fn kinds_are_stable() {
    let err = Error::DuplicateEntity {
        id: "t1".to_string(),
        scope: "tasks?workspace=ws1".to_string(),
    };
    assert_eq!(err.kind(), "duplicate_entity");
    assert!(err.to_string().contains("tasks?workspace=ws1"));
    assert_eq!(
        Error::ScopeUnresolved {
            kind: EntityKind::Column
        }
        .kind(),
        "scope_unresolved"
    );
}
