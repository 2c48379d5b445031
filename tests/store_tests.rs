use chrono::{DateTime, Duration, TimeZone, Utc};
use household_chores::persistence::{BoardPersistence, PersistenceError, PersistenceResult};
use household_chores::{
    BoardDefaults, BoardError, BoardSnapshot, EntityKind, MemoryBoardStore, NewTask, NewTemplate,
    TaskBoardStore, TaskStatus, TaskUpdate, UpdateNotifier,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn defaults() -> BoardDefaults {
    BoardDefaults {
        members: vec!["Alex".into(), "Sam".into()],
        chores: vec!["Dishes".into(), "Take out bins".into()],
    }
}

/// Memory store whose saves can be switched to fail.
#[derive(Default)]
struct FlakyPersistence {
    inner: MemoryBoardStore,
    failing: AtomicBool,
}

impl FlakyPersistence {
    fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl BoardPersistence for FlakyPersistence {
    fn load_board(&self, board_id: &str) -> PersistenceResult<Option<BoardSnapshot>> {
        self.inner.load_board(board_id)
    }

    fn save_board(&self, board_id: &str, snapshot: &BoardSnapshot) -> PersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save_board(board_id, snapshot)
    }

    fn remove_board(&self, board_id: &str) -> PersistenceResult<()> {
        self.inner.remove_board(board_id)
    }
}

fn new_store() -> TaskBoardStore {
    TaskBoardStore::load(
        "home",
        &defaults(),
        Arc::new(MemoryBoardStore::new()),
        Arc::new(UpdateNotifier::new()),
    )
}

fn wednesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap()
}

#[test]
fn fresh_board_comes_from_defaults() {
    let board = new_store().snapshot();
    assert_eq!(board.people, vec!["Alex", "Sam"]);
    let templates: Vec<(&str, &str)> = board
        .templates
        .iter()
        .map(|t| (t.id.as_str(), t.title.as_str()))
        .collect();
    assert_eq!(
        templates,
        vec![("dishes", "Dishes"), ("take-out-bins", "Take out bins")]
    );
    assert!(board.tasks.is_empty());
}

#[test]
fn corrupt_stored_board_falls_back_to_defaults() {
    let persistence = Arc::new(MemoryBoardStore::new());
    persistence.insert_raw("home", "{ not json");
    let store = TaskBoardStore::load(
        "home",
        &defaults(),
        persistence,
        Arc::new(UpdateNotifier::new()),
    );
    assert_eq!(store.snapshot().people, vec!["Alex", "Sam"]);
}

#[test]
fn stored_board_wins_over_defaults() {
    let persistence = Arc::new(MemoryBoardStore::new());
    let notifier = Arc::new(UpdateNotifier::new());
    let first = TaskBoardStore::load(
        "home",
        &defaults(),
        persistence.clone(),
        notifier.clone(),
    );
    first.add_person("Robin").unwrap();
    let task = first.add_task(NewTask::new("Water plants", "Robin")).unwrap();

    let reloaded = TaskBoardStore::load("home", &defaults(), persistence, notifier);
    let board = reloaded.snapshot();
    assert_eq!(board.people, vec!["Alex", "Sam", "Robin"]);
    assert_eq!(board.find_task(&task.id), Some(&task));
}

#[test]
fn add_task_validates_before_changing_anything() {
    let store = new_store();
    let before = store.snapshot();

    let err = store.add_task(NewTask::new("Dishes", "Nobody")).unwrap_err();
    assert!(matches!(
        err,
        BoardError::NotFound {
            kind: EntityKind::Person,
            ..
        }
    ));

    let err = store.add_task(NewTask::new("   ", "Alex")).unwrap_err();
    assert!(matches!(err, BoardError::Invalid(_)));

    let mut with_template = NewTask::new("Dishes", "Alex");
    with_template.template_id = Some("no-such-template".into());
    let err = store.add_task(with_template).unwrap_err();
    assert!(matches!(
        err,
        BoardError::NotFound {
            kind: EntityKind::Template,
            ..
        }
    ));

    assert_eq!(store.snapshot(), before);
}

#[test]
fn duplicate_ids_are_conflicts() {
    let store = new_store();
    store
        .add_task(NewTask::new("Dishes", "Alex").with_id("t1"))
        .unwrap();
    let err = store
        .add_task(NewTask::new("Bins", "Sam").with_id("t1"))
        .unwrap_err();
    assert!(matches!(
        err,
        BoardError::Conflict {
            kind: EntityKind::Task,
            ..
        }
    ));

    let err = store.add_person("Alex").unwrap_err();
    assert!(matches!(
        err,
        BoardError::Conflict {
            kind: EntityKind::Person,
            ..
        }
    ));

    let mut template = NewTemplate::new("Again");
    template.id = Some("dishes".into());
    let err = store.add_template(template).unwrap_err();
    assert!(matches!(
        err,
        BoardError::Conflict {
            kind: EntityKind::Template,
            ..
        }
    ));
}

#[test]
fn complete_update_and_delete_task() {
    let store = new_store();
    let task = store.add_task(NewTask::new("Dishes", "Alex")).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.id.len(), 32);

    let done = store.complete_task(&task.id).unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    let completed_at = done.completed_at.unwrap();

    let updated = store
        .update_task(
            &task.id,
            TaskUpdate {
                title: Some("Dishes and pans".into()),
                assignee_name: Some("Sam".into()),
                status: Some(TaskStatus::Pending),
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Dishes and pans");
    assert_eq!(updated.assignee_name, "Sam");
    assert!(updated.completed_at.is_none());
    assert!(completed_at >= updated.created_at);

    let deleted = store.delete_task(&task.id).unwrap();
    assert_eq!(deleted.id, task.id);
    assert!(matches!(
        store.complete_task(&task.id),
        Err(BoardError::NotFound {
            kind: EntityKind::Task,
            ..
        })
    ));
}

#[test]
fn no_op_mutations_do_not_commit() {
    let store = new_store();
    let mut sub = store.subscribe();
    let task = store.add_task(NewTask::new("Dishes", "Alex")).unwrap();
    store.complete_task(&task.id).unwrap();
    while sub.try_changed().unwrap() {}

    let stamp = store.updated_at();
    let again = store.complete_task(&task.id).unwrap();
    assert_eq!(again.status, TaskStatus::Done);
    store
        .update_task(&task.id, TaskUpdate::default())
        .unwrap();

    assert_eq!(store.updated_at(), stamp);
    assert!(!sub.try_changed().unwrap());
}

#[test]
fn updated_at_moves_forward_on_every_commit() {
    let store = new_store();
    let mut last = store.updated_at();
    for name in ["A", "B", "C", "D"] {
        store.add_person(name).unwrap();
        let now = store.updated_at();
        assert!(now > last);
        last = now;
    }
}

#[test]
fn failed_save_rolls_back_and_stays_silent() {
    let persistence = Arc::new(FlakyPersistence::default());
    let store = TaskBoardStore::load(
        "home",
        &defaults(),
        persistence.clone(),
        Arc::new(UpdateNotifier::new()),
    );
    store.add_task(NewTask::new("Dishes", "Alex")).unwrap();
    let before = store.snapshot();
    let mut sub = store.subscribe();

    persistence.fail_saves(true);
    let err = store.add_task(NewTask::new("Bins", "Sam")).unwrap_err();
    assert!(matches!(err, BoardError::Persistence(_)));
    assert!(store.remove_person("Sam").is_err());

    assert_eq!(store.snapshot(), before);
    assert!(!sub.try_changed().unwrap());

    persistence.fail_saves(false);
    store.add_task(NewTask::new("Bins", "Sam")).unwrap();
    assert_eq!(store.snapshot().tasks.len(), 2);
    assert!(sub.try_changed().unwrap());
}

#[test]
fn removing_people_and_templates_keeps_tasks() {
    let store = new_store();
    let mut linked = NewTask::new("Dishes", "Sam");
    linked.template_id = Some("dishes".into());
    let task = store.add_task(linked).unwrap();

    store.remove_person("Sam").unwrap();
    let removed = store.remove_template("dishes").unwrap();
    assert_eq!(removed.title, "Dishes");

    let board = store.snapshot();
    let kept = board.find_task(&task.id).unwrap();
    assert_eq!(kept.assignee_name, "Sam");
    assert!(kept.template_id.is_none());
    assert!(!board.has_person("Sam"));

    assert!(matches!(
        store.remove_person("Sam"),
        Err(BoardError::NotFound {
            kind: EntityKind::Person,
            ..
        })
    ));
}

#[test]
fn template_ids_are_slugged_and_unique() {
    let store = new_store();
    let first = store.add_template(NewTemplate::new("Mop floors")).unwrap();
    let second = store.add_template(NewTemplate::new("Mop  floors!")).unwrap();
    assert_eq!(first.id, "mop-floors");
    assert_eq!(second.id, "mop-floors-2");
    assert_eq!(first.recurrence.to_string(), "once per week");
}

#[test]
fn remove_done_tasks_only_touches_done_tasks() {
    let store = new_store();
    let mut sub = store.subscribe();

    assert_eq!(store.remove_done_tasks().unwrap(), 0);
    assert!(!sub.try_changed().unwrap());

    let a = store.add_task(NewTask::new("A", "Alex")).unwrap();
    let b = store.add_task(NewTask::new("B", "Sam")).unwrap();
    let c = store.add_task(NewTask::new("C", "Alex")).unwrap();
    store.complete_task(&a.id).unwrap();
    store.complete_task(&c.id).unwrap();
    while sub.try_changed().unwrap() {}

    let pending_before: Vec<_> = store
        .snapshot()
        .tasks
        .into_iter()
        .filter(|t| t.is_pending())
        .collect();

    assert_eq!(store.remove_done_tasks().unwrap(), 2);
    assert!(sub.try_changed().unwrap());

    let board = store.snapshot();
    assert_eq!(board.tasks, pending_before);
    assert_eq!(board.tasks[0].id, b.id);
}

#[test]
fn weekly_refresh_is_idempotent_within_a_cycle() {
    let store = new_store();
    let now = wednesday();

    assert_eq!(store.weekly_refresh_at(&now).unwrap(), 2);
    let stamp = store.updated_at();
    assert_eq!(store.weekly_refresh_at(&now).unwrap(), 0);
    assert_eq!(
        store
            .weekly_refresh_at(&(now + Duration::days(3)))
            .unwrap(),
        0
    );
    assert_eq!(store.updated_at(), stamp);

    let board = store.snapshot();
    assert_eq!(board.pending_count(), 2);
    let mut assignees: Vec<&str> = board
        .tasks
        .iter()
        .map(|t| t.assignee_name.as_str())
        .collect();
    assignees.sort();
    assert_eq!(assignees, vec!["Alex", "Sam"]);
    assert!(board.tasks.iter().all(|t| t.template_id.is_some()));
}

#[test]
fn weekly_refresh_rotates_assignees_each_week() {
    let store = new_store();
    let now = wednesday();
    store.weekly_refresh_at(&now).unwrap();
    let week_one = store.snapshot();

    let next_week = now + Duration::days(7);
    assert_eq!(store.weekly_refresh_at(&next_week).unwrap(), 2);

    let board = store.snapshot();
    for template in &board.templates {
        let owners: Vec<&str> = board
            .tasks
            .iter()
            .filter(|t| t.template_id.as_deref() == Some(template.id.as_str()))
            .map(|t| t.assignee_name.as_str())
            .collect();
        assert_eq!(owners.len(), 2, "{owners:?}");
        assert_ne!(owners[0], owners[1]);
    }
    assert!(week_one.tasks.iter().all(|t| board.find_task(&t.id).is_some()));
}

#[test]
fn weekly_refresh_fills_only_missing_templates() {
    let store = new_store();
    let mut manual = NewTask::new("Dishes", "Alex");
    manual.template_id = Some("dishes".into());
    store.add_task(manual).unwrap();

    // The manual task was created with the wall clock, so pin the refresh
    // to the same cycle as that.
    let created = store.weekly_refresh_at(&Utc::now()).unwrap();
    assert_eq!(created, 1);
    let board = store.snapshot();
    assert_eq!(
        board
            .tasks
            .iter()
            .filter(|t| t.template_id.as_deref() == Some("take-out-bins"))
            .count(),
        1
    );
}

#[test]
fn weekly_refresh_without_people_creates_nothing() {
    let store = TaskBoardStore::load(
        "empty",
        &BoardDefaults {
            members: vec![],
            chores: vec!["Dishes".into()],
        },
        Arc::new(MemoryBoardStore::new()),
        Arc::new(UpdateNotifier::new()),
    );
    assert_eq!(store.weekly_refresh_at(&wednesday()).unwrap(), 0);
}

#[test]
fn concurrent_commands_and_maintenance_lose_nothing() {
    let store = Arc::new(new_store());
    let seeded = store.add_task(NewTask::new("Seed", "Alex")).unwrap();
    store.complete_task(&seeded.id).unwrap();

    let removed = std::thread::scope(|scope| {
        for worker in 0..4 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..25 {
                    let assignee = if i % 2 == 0 { "Alex" } else { "Sam" };
                    store
                        .add_task(NewTask::new(format!("w{worker}-{i}"), assignee))
                        .unwrap();
                }
            });
        }
        let cleaner = {
            let store = Arc::clone(&store);
            scope.spawn(move || store.remove_done_tasks().unwrap())
        };
        cleaner.join().unwrap()
    });

    let board = store.snapshot();
    assert_eq!(removed, 1);
    assert_eq!(board.tasks.len(), 100);
    assert_eq!(board.pending_count(), 100);
}
