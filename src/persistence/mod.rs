use crate::board::BoardSnapshot;
use crate::board_validation;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Per-board snapshot storage.
///
/// `save` must replace the whole snapshot atomically: a reader sees either
/// the previous snapshot or the new one, never a mix.
pub trait BoardPersistence: Send + Sync {
    fn load_board(&self, board_id: &str) -> PersistenceResult<Option<BoardSnapshot>>;
    fn save_board(&self, board_id: &str, snapshot: &BoardSnapshot) -> PersistenceResult<()>;
    fn remove_board(&self, board_id: &str) -> PersistenceResult<()>;
}

pub fn validate_snapshot(snapshot: &BoardSnapshot) -> PersistenceResult<()> {
    board_validation::validate_snapshot(snapshot)
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

/// Keeps serialized snapshots in memory, so it exercises the same encode and
/// decode path as the on-disk stores.
#[derive(Debug, Default)]
pub struct MemoryBoardStore {
    boards: Mutex<HashMap<String, String>>,
}

impl MemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, board_id: &str) -> bool {
        self.boards.lock().contains_key(board_id)
    }

    /// Store raw text for a board, bypassing validation.
    pub fn insert_raw(&self, board_id: &str, raw: impl Into<String>) {
        self.boards.lock().insert(board_id.to_string(), raw.into());
    }
}

impl BoardPersistence for MemoryBoardStore {
    fn load_board(&self, board_id: &str) -> PersistenceResult<Option<BoardSnapshot>> {
        let raw = self.boards.lock().get(board_id).cloned();
        let Some(raw) = raw else {
            return Ok(None);
        };
        let snapshot: BoardSnapshot = serde_json::from_str(&raw)?;
        validate_snapshot(&snapshot)?;
        Ok(Some(snapshot))
    }

    fn save_board(&self, board_id: &str, snapshot: &BoardSnapshot) -> PersistenceResult<()> {
        validate_snapshot(snapshot)?;
        let raw = serde_json::to_string(snapshot)?;
        self.boards.lock().insert(board_id.to_string(), raw);
        Ok(())
    }

    fn remove_board(&self, board_id: &str) -> PersistenceResult<()> {
        self.boards.lock().remove(board_id);
        Ok(())
    }
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::JsonFileBoardStore;
