//! boardsync - optimistic reordering of nested ordered collections
//!
//! Client-side engine for drag-and-drop reordering of workspaces, board
//! columns and tasks. Every change is applied to a local cache first,
//! persisted in the background, and rolled back with a single notice when
//! the server rejects it.
//!
//! # Core Concepts
//!
//! - **Scopes**: keys identifying one cached ordered list (`tasks?workspace=ws1`)
//! - **Drag sessions**: staged orderings kept apart from the cache until drop
//! - **Move guard**: refuses to bounce an item straight back between containers
//! - **Reconciliation**: zero-based positions per container, sent as one batch
//! - **Optimistic mutations**: snapshot, apply, persist, roll back or settle
//!
//! # Module Organization
//!
//! - `entity`, `scope`: data model and scope keys
//! - `cache`: the shared ordered-collection cache and fetch tickets
//! - `drag`, `guard`: drag session controller and cross-container move guard
//! - `reconcile`: staged order to position batches
//! - `sync`, `notify`: optimistic mutations and user notices
//! - `board`: the UI-facing sortable lists
//! - `backend`, `lock`: list/position/entity contracts and the file backend
//! - `cli`, `config`, `output`, `error`: the `boardsync` binary's ambient stack

pub mod backend;
pub mod board;
pub mod cache;
pub mod cli;
pub mod config;
pub mod drag;
pub mod entity;
pub mod error;
pub mod guard;
pub mod lock;
pub mod notify;
pub mod output;
pub mod reconcile;
pub mod scope;
pub mod sync;

pub use error::{Error, Result};
