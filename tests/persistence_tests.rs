use chrono::{TimeZone, Utc};
use household_chores::persistence::{BoardPersistence, PersistenceError};
use household_chores::{
    BoardSnapshot, ChoreTask, ChoreTemplate, JsonFileBoardStore, MemoryBoardStore, TaskStatus,
};
use tempfile::tempdir;

fn sample_board() -> BoardSnapshot {
    let created = Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap();
    BoardSnapshot {
        people: vec!["Alex".into(), "Sam".into()],
        tasks: vec![
            ChoreTask {
                id: "t1".into(),
                title: "Dishes".into(),
                assignee_name: "Alex".into(),
                status: TaskStatus::Done,
                created_at: created,
                completed_at: Some(Utc.with_ymd_and_hms(2025, 1, 6, 20, 0, 0).unwrap()),
                template_id: Some("dishes".into()),
            },
            ChoreTask {
                id: "t2".into(),
                title: "Fix the shelf".into(),
                assignee_name: "Sam".into(),
                status: TaskStatus::Pending,
                created_at: created,
                completed_at: None,
                template_id: None,
            },
        ],
        templates: vec![ChoreTemplate::weekly("dishes", "Dishes")],
        updated_at: Utc.with_ymd_and_hms(2025, 1, 6, 20, 0, 0).unwrap(),
    }
}

#[test]
fn snapshot_serializes_to_the_external_schema() {
    let value = serde_json::to_value(sample_board()).unwrap();
    assert_eq!(value["people"], serde_json::json!(["Alex", "Sam"]));
    assert_eq!(value["updatedAt"], "2025-01-06T20:00:00Z");
    assert_eq!(value["templates"][0]["recurrence"], "weekly");

    let done = &value["tasks"][0];
    assert_eq!(done["assigneeName"], "Alex");
    assert_eq!(done["status"], "done");
    assert_eq!(done["templateId"], "dishes");
    assert_eq!(done["createdAt"], "2025-01-06T08:00:00Z");

    let pending = value["tasks"][1].as_object().unwrap();
    assert_eq!(pending["status"], "pending");
    assert!(!pending.contains_key("completedAt"));
    assert!(!pending.contains_key("templateId"));
}

#[test]
fn json_store_round_trip_and_atomic_replace() {
    let dir = tempdir().unwrap();
    let store = JsonFileBoardStore::new(dir.path().join("boards")).unwrap();
    assert!(store.load_board("home").unwrap().is_none());

    let mut board = sample_board();
    store.save_board("home", &board).unwrap();
    assert_eq!(store.load_board("home").unwrap(), Some(board.clone()));

    board.tasks.remove(0);
    store.save_board("home", &board).unwrap();
    assert_eq!(store.load_board("home").unwrap(), Some(board));

    // Only the board file remains; no temporary siblings.
    let entries: Vec<String> = std::fs::read_dir(store.dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["home.json"]);

    store.remove_board("home").unwrap();
    assert!(store.load_board("home").unwrap().is_none());
    // Removing twice is fine.
    store.remove_board("home").unwrap();
}

#[test]
fn json_store_rejects_unsafe_ids_and_bad_files() {
    let dir = tempdir().unwrap();
    let store = JsonFileBoardStore::new(dir.path()).unwrap();

    assert!(matches!(
        store.save_board("../escape", &sample_board()),
        Err(PersistenceError::InvalidData(_))
    ));
    assert!(store.board_path("").is_err());

    std::fs::write(dir.path().join("broken.json"), "{\"people\": 3}").unwrap();
    assert!(matches!(
        store.load_board("broken"),
        Err(PersistenceError::Serialization(_))
    ));
}

#[test]
fn invalid_snapshots_are_refused() {
    let store = MemoryBoardStore::new();
    let mut board = sample_board();
    board.people.push("Alex".into());
    assert!(matches!(
        store.save_board("home", &board),
        Err(PersistenceError::InvalidData(_))
    ));
    assert!(!store.contains("home"));

    let mut board = sample_board();
    board.tasks[1].completed_at = Some(board.updated_at);
    assert!(store.save_board("home", &board).is_err());
}

#[test]
fn memory_store_keeps_boards_apart() {
    let store = MemoryBoardStore::new();
    store.save_board("a", &sample_board()).unwrap();
    assert!(store.contains("a"));
    assert!(store.load_board("b").unwrap().is_none());
    store.remove_board("a").unwrap();
    assert!(!store.contains("a"));
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::sample_board;
    use household_chores::SqliteBoardStore;
    use household_chores::persistence::BoardPersistence;
    use tempfile::NamedTempFile;

    #[test]
    fn sqlite_store_round_trip_board() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteBoardStore::new(file.path()).unwrap();

        let board = sample_board();
        store.save_board("home", &board).expect("save board");
        let loaded = store
            .load_board("home")
            .expect("load board")
            .expect("board exists");
        assert_eq!(loaded, board);

        // A second connection sees the committed row.
        let reopened = SqliteBoardStore::new(file.path()).unwrap();
        assert_eq!(reopened.load_board("home").unwrap(), Some(board));
    }

    #[test]
    fn sqlite_store_replaces_and_removes_rows() {
        let store = SqliteBoardStore::in_memory().unwrap();
        let mut board = sample_board();
        store.save_board("home", &board).unwrap();
        store.save_board("cabin", &board).unwrap();

        board.people.push("Robin".into());
        store.save_board("home", &board).unwrap();
        assert_eq!(store.board_ids().unwrap(), vec!["cabin", "home"]);
        assert_eq!(
            store.load_board("home").unwrap().unwrap().people,
            vec!["Alex", "Sam", "Robin"]
        );

        store.remove_board("cabin").unwrap();
        assert!(store.load_board("cabin").unwrap().is_none());
        assert_eq!(store.board_ids().unwrap(), vec!["home"]);
    }
}
