#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use boardsync::backend::{BoardDocument, MemoryBackend, WorkspaceBoard};
use boardsync::board::Board;
use boardsync::config::Config;
use boardsync::entity::Entity;
use tempfile::TempDir;

/// Two workspaces; ws1 has columns T1..T3 with t1..t3 in T1 and t4 in T2.
pub fn sample_document() -> BoardDocument {
    let mut boards = BTreeMap::new();
    boards.insert(
        "ws1".to_string(),
        WorkspaceBoard {
            columns: vec![
                Entity::column("T1", 0).with_title("Todo"),
                Entity::column("T2", 1).with_title("Doing"),
                Entity::column("T3", 2).with_title("Done"),
            ],
            tasks: vec![
                Entity::task("t1", "T1", 0).with_tags(["bug"]),
                Entity::task("t2", "T1", 1),
                Entity::task("t3", "T1", 2).with_tags(["bug"]),
                Entity::task("t4", "T2", 0),
            ],
        },
    );
    boards.insert(
        "ws2".to_string(),
        WorkspaceBoard {
            columns: vec![Entity::column("U1", 0)],
            tasks: vec![Entity::task("u1", "U1", 0)],
        },
    );
    BoardDocument {
        workspaces: vec![Entity::workspace("ws1", 0), Entity::workspace("ws2", 1)],
        boards,
    }
}

/// A board over an in-memory copy of [`sample_document`]
pub fn memory_board() -> Board<MemoryBackend> {
    Board::new(MemoryBackend::new(sample_document()), &Config::default()).expect("board")
}

pub fn ids(list: &[Entity]) -> Vec<&str> {
    list.iter().map(|entity| entity.id.as_str()).collect()
}

/// Directory holding `board.json` seeded from [`sample_document`]
pub struct TestBoardDir {
    dir: TempDir,
}

impl TestBoardDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let json = serde_json::to_string_pretty(&sample_document()).expect("serialize board");
        fs::write(dir.path().join("board.json"), json).expect("write board");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn board_path(&self) -> PathBuf {
        self.dir.path().join("board.json")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read_document(&self) -> BoardDocument {
        let raw = fs::read_to_string(self.board_path()).expect("read board");
        serde_json::from_str(&raw).expect("parse board")
    }
}
