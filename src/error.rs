//! Error types for boardsync
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown scope or entity, bad config)
//! - 3: Blocked (no cached scope owns a position batch)
//! - 4: Operation failed (persistence, IO, lock contention)

use std::path::PathBuf;
use thiserror::Error;

use crate::entity::EntityKind;

/// Exit codes for the boardsync CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for boardsync operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid scope key: {0}")]
    InvalidScope(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Duplicate entity {id} in {scope}")]
    DuplicateEntity { id: String, scope: String },

    // Blocked (exit code 3)
    #[error("Cannot resolve the scope owning {kind} updates: no cached {kind} list is populated")]
    ScopeUnresolved { kind: EntityKind },

    // Operation failures (exit code 4)
    #[error("Persistence failed: {0}")]
    PersistFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidScope(_)
            | Error::EntityNotFound(_)
            | Error::DuplicateEntity { .. } => exit_codes::USER_ERROR,

            // Blocked
            Error::ScopeUnresolved { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::PersistFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable kind used in JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidScope(_) => "invalid_scope",
            Error::EntityNotFound(_) => "entity_not_found",
            Error::DuplicateEntity { .. } => "duplicate_entity",
            Error::ScopeUnresolved { .. } => "scope_unresolved",
            Error::PersistFailed(_) => "persist_failed",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) | Error::TomlSerialize(_) => "toml",
            Error::LockFailed(_) => "lock_failed",
            Error::OperationFailed(_) => "operation_failed",
        }
    }

    /// What to try next, for errors the user can act on
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::InvalidScope(_) => {
                Some("use <kind>[?workspace=<id>], e.g. tasks?workspace=ws1".to_string())
            }
            Error::InvalidConfig(_) => Some("fix .boardsync.toml then retry".to_string()),
            Error::LockFailed(_) => Some("retry once the other writer finishes".to_string()),
            Error::ScopeUnresolved { kind } => {
                Some(format!("boardsync show {}?workspace=<id>", kind.plural()))
            }
            _ => None,
        }
    }
}

/// Result type alias for boardsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            hint: err.hint(),
        }
    }
}
