use super::{BoardPersistence, PersistenceResult};
use crate::board::BoardSnapshot;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

/// All boards in one SQLite database, one row per board.
pub struct SqliteBoardStore {
    connection: Mutex<Connection>,
}

impl SqliteBoardStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS boards (
                board_id TEXT PRIMARY KEY,
                snapshot_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    pub fn board_ids(&self) -> PersistenceResult<Vec<String>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT board_id FROM boards ORDER BY board_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }
}

impl BoardPersistence for SqliteBoardStore {
    fn load_board(&self, board_id: &str) -> PersistenceResult<Option<BoardSnapshot>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT snapshot_json FROM boards WHERE board_id = ?1")?;
        let json: Option<String> = stmt
            .query_row(params![board_id], |row| row.get(0))
            .optional()?;

        let Some(json) = json else {
            return Ok(None);
        };
        let snapshot: BoardSnapshot = serde_json::from_str(&json)?;
        super::validate_snapshot(&snapshot)?;
        Ok(Some(snapshot))
    }

    fn save_board(&self, board_id: &str, snapshot: &BoardSnapshot) -> PersistenceResult<()> {
        super::validate_snapshot(snapshot)?;
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO boards (board_id, snapshot_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(board_id) DO UPDATE SET
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at",
            params![board_id, json, snapshot.updated_at.to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_board(&self, board_id: &str) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM boards WHERE board_id = ?1", params![board_id])?;
        Ok(())
    }
}
