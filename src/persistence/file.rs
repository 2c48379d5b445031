use super::{BoardPersistence, PersistenceError, PersistenceResult};
use crate::board::BoardSnapshot;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

/// One pretty-printed JSON file per board under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileBoardStore {
    dir: PathBuf,
}

impl JsonFileBoardStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> PersistenceResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn board_path(&self, board_id: &str) -> PersistenceResult<PathBuf> {
        if board_id.is_empty()
            || board_id.starts_with('.')
            || board_id.contains(['/', '\\'])
        {
            return Err(PersistenceError::InvalidData(format!(
                "board id '{board_id}' cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{board_id}.json")))
    }
}

impl BoardPersistence for JsonFileBoardStore {
    fn load_board(&self, board_id: &str) -> PersistenceResult<Option<BoardSnapshot>> {
        let path = self.board_path(board_id)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot: BoardSnapshot = serde_json::from_reader(BufReader::new(file))?;
        super::validate_snapshot(&snapshot)?;
        Ok(Some(snapshot))
    }

    fn save_board(&self, board_id: &str, snapshot: &BoardSnapshot) -> PersistenceResult<()> {
        super::validate_snapshot(snapshot)?;
        let path = self.board_path(board_id)?;
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&path, &json)
    }

    fn remove_board(&self, board_id: &str) -> PersistenceResult<()> {
        let path = self.board_path(board_id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Write to a hidden sibling, flush it to disk, then rename over `path`.
fn write_atomic(path: &Path, content: &[u8]) -> PersistenceResult<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("board.json");
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.map_err(PersistenceError::from)
}
