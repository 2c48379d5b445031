//! Mutable, persisted task board for one household.
//!
//! Every mutation runs as one read-modify-persist-notify cycle under the
//! board's write lock. The change is applied to a private copy of the last
//! committed snapshot; the copy only replaces the committed snapshot after
//! persistence accepted it, so a failed save leaves nothing behind.
//! Readers never take the write lock and always see a whole snapshot.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::{
    BoardSnapshot, ChoreTask, ChoreTemplate, NewTask, NewTemplate, TaskStatus, TaskUpdate,
    unique_slug,
};
use crate::calendar;
use crate::error::{BoardError, BoardResult, EntityKind};
use crate::notifier::{BoardSubscription, UpdateNotifier};
use crate::persistence::BoardPersistence;
use crate::rotation;

/// Members and chores used when a board has no usable stored state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardDefaults {
    pub members: Vec<String>,
    pub chores: Vec<String>,
}

enum Outcome<T> {
    Changed(T),
    Unchanged(T),
}

pub struct TaskBoardStore {
    board_id: String,
    persistence: Arc<dyn BoardPersistence>,
    notifier: Arc<UpdateNotifier>,
    committed: RwLock<Arc<BoardSnapshot>>,
    write_lock: Mutex<()>,
    retired: AtomicBool,
}

impl TaskBoardStore {
    /// Restore the board from persistence, or start from `defaults`.
    ///
    /// Never fails: unreadable or malformed stored state is logged and
    /// replaced by the defaults.
    pub fn load(
        board_id: impl Into<String>,
        defaults: &BoardDefaults,
        persistence: Arc<dyn BoardPersistence>,
        notifier: Arc<UpdateNotifier>,
    ) -> Self {
        let board_id = board_id.into();
        let snapshot = match persistence.load_board(&board_id) {
            Ok(Some(snapshot)) => {
                debug!(
                    "loaded board {board_id}: {} people, {} templates, {} tasks",
                    snapshot.people.len(),
                    snapshot.templates.len(),
                    snapshot.tasks.len()
                );
                snapshot
            }
            Ok(None) => {
                info!("no stored state for board {board_id}, starting from defaults");
                BoardSnapshot::from_defaults(&defaults.members, &defaults.chores, Utc::now())
            }
            Err(err) => {
                warn!("cannot load board {board_id}, starting from defaults: {err}");
                BoardSnapshot::from_defaults(&defaults.members, &defaults.chores, Utc::now())
            }
        };

        Self {
            board_id,
            persistence,
            notifier,
            committed: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.board_id
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let current = Arc::clone(&*self.committed.read());
        (*current).clone()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.committed.read().updated_at
    }

    pub fn subscribe(&self) -> BoardSubscription {
        self.notifier.subscribe(&self.board_id)
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Stop accepting work. Waits for an in-flight mutation to finish; every
    /// later call fails with [`BoardError::Removed`].
    pub(crate) fn retire(&self) {
        let _guard = self.write_lock.lock();
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn add_task(&self, new_task: NewTask) -> BoardResult<ChoreTask> {
        self.mutate(|board, now| {
            let title = required_text(&new_task.title, "task title")?;
            if !board.has_person(&new_task.assignee_name) {
                return Err(BoardError::not_found(
                    EntityKind::Person,
                    new_task.assignee_name.clone(),
                ));
            }
            if let Some(template_id) = &new_task.template_id {
                if board.find_template(template_id).is_none() {
                    return Err(BoardError::not_found(EntityKind::Template, template_id.clone()));
                }
            }
            let id = match &new_task.id {
                Some(id) => {
                    let id = required_text(id, "task id")?;
                    if board.find_task(&id).is_some() {
                        return Err(BoardError::conflict(EntityKind::Task, id));
                    }
                    id
                }
                None => fresh_task_id(board),
            };

            let task = ChoreTask {
                id,
                title,
                assignee_name: new_task.assignee_name.clone(),
                status: TaskStatus::Pending,
                created_at: now,
                completed_at: None,
                template_id: new_task.template_id.clone(),
            };
            board.tasks.push(task.clone());
            Ok(Outcome::Changed(task))
        })
    }

    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> BoardResult<ChoreTask> {
        self.mutate(|board, now| {
            if let Some(assignee) = &update.assignee_name {
                if !board.has_person(assignee) {
                    return Err(BoardError::not_found(EntityKind::Person, assignee.clone()));
                }
            }
            let title = match &update.title {
                Some(title) => Some(required_text(title, "task title")?),
                None => None,
            };

            let task = board
                .find_task_mut(task_id)
                .ok_or_else(|| BoardError::not_found(EntityKind::Task, task_id))?;
            let before = task.clone();
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(assignee) = &update.assignee_name {
                task.assignee_name = assignee.clone();
            }
            if let Some(status) = update.status {
                if status != task.status {
                    task.set_status(status, now);
                }
            }

            if *task == before {
                Ok(Outcome::Unchanged(before))
            } else {
                Ok(Outcome::Changed(task.clone()))
            }
        })
    }

    /// Mark a task done. Completing an already-done task commits nothing.
    pub fn complete_task(&self, task_id: &str) -> BoardResult<ChoreTask> {
        self.mutate(|board, now| {
            let task = board
                .find_task_mut(task_id)
                .ok_or_else(|| BoardError::not_found(EntityKind::Task, task_id))?;
            if task.is_done() {
                return Ok(Outcome::Unchanged(task.clone()));
            }
            task.set_status(TaskStatus::Done, now);
            Ok(Outcome::Changed(task.clone()))
        })
    }

    pub fn delete_task(&self, task_id: &str) -> BoardResult<ChoreTask> {
        self.mutate(|board, _| {
            let index = board
                .tasks
                .iter()
                .position(|task| task.id == task_id)
                .ok_or_else(|| BoardError::not_found(EntityKind::Task, task_id))?;
            Ok(Outcome::Changed(board.tasks.remove(index)))
        })
    }

    pub fn add_person(&self, name: &str) -> BoardResult<String> {
        self.mutate(|board, _| {
            let name = required_text(name, "person name")?;
            if board.has_person(&name) {
                return Err(BoardError::conflict(EntityKind::Person, name));
            }
            board.people.push(name.clone());
            Ok(Outcome::Changed(name))
        })
    }

    /// Tasks already assigned to the person keep their assignee name.
    pub fn remove_person(&self, name: &str) -> BoardResult<()> {
        self.mutate(|board, _| {
            let index = board
                .people
                .iter()
                .position(|person| person == name)
                .ok_or_else(|| BoardError::not_found(EntityKind::Person, name))?;
            board.people.remove(index);
            Ok(Outcome::Changed(()))
        })
    }

    pub fn add_template(&self, new_template: NewTemplate) -> BoardResult<ChoreTemplate> {
        self.mutate(|board, _| {
            let title = required_text(&new_template.title, "template title")?;
            let id = match &new_template.id {
                Some(id) => {
                    let id = required_text(id, "template id")?;
                    if board.find_template(&id).is_some() {
                        return Err(BoardError::conflict(EntityKind::Template, id));
                    }
                    id
                }
                None => unique_slug(&title, |candidate| board.find_template(candidate).is_some()),
            };
            let template = ChoreTemplate::weekly(id, title);
            board.templates.push(template.clone());
            Ok(Outcome::Changed(template))
        })
    }

    /// Tasks spawned from the template are kept but unlinked.
    pub fn remove_template(&self, template_id: &str) -> BoardResult<ChoreTemplate> {
        self.mutate(|board, _| {
            let index = board
                .templates
                .iter()
                .position(|template| template.id == template_id)
                .ok_or_else(|| BoardError::not_found(EntityKind::Template, template_id))?;
            let removed = board.templates.remove(index);
            for task in &mut board.tasks {
                if task.template_id.as_deref() == Some(template_id) {
                    task.template_id = None;
                }
            }
            Ok(Outcome::Changed(removed))
        })
    }

    /// Delete every done task and return how many went.
    pub fn remove_done_tasks(&self) -> BoardResult<usize> {
        self.mutate(|board, _| {
            let before = board.tasks.len();
            board.tasks.retain(|task| !task.is_done());
            let removed = before - board.tasks.len();
            if removed == 0 {
                Ok(Outcome::Unchanged(0))
            } else {
                Ok(Outcome::Changed(removed))
            }
        })
    }

    pub fn weekly_refresh(&self) -> BoardResult<usize> {
        self.weekly_refresh_at(&chrono::Local::now())
    }

    /// Spawn one pending task for every template without a pending task in
    /// the week (Monday to Monday, local to `now`) that contains `now`.
    ///
    /// The assignee follows the same rotation as the generated schedule: the
    /// template at position `i` goes to member `(week + i) % people`, where
    /// `week` counts weeks since the Monday of 1970-01-05.
    pub fn weekly_refresh_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> BoardResult<usize> {
        let cycle_start = calendar::cycle_start(now).with_timezone(&Utc);
        let week = week_number(calendar::week_start(now.date_naive()));

        let created = self.mutate_at(now.with_timezone(&Utc), |board, now| {
            if board.people.is_empty() {
                return Ok(Outcome::Unchanged(0));
            }

            let mut spawned = Vec::new();
            for (position, template) in board.templates.iter().enumerate() {
                let has_current = board.tasks.iter().any(|task| {
                    task.is_pending()
                        && task.created_at >= cycle_start
                        && task.template_id.as_deref() == Some(template.id.as_str())
                });
                if has_current {
                    continue;
                }
                let member = rotation::assigned_member(week, position, board.people.len());
                spawned.push(ChoreTask {
                    id: String::new(),
                    title: template.title.clone(),
                    assignee_name: board.people[member].clone(),
                    status: TaskStatus::Pending,
                    created_at: now,
                    completed_at: None,
                    template_id: Some(template.id.clone()),
                });
            }

            let count = spawned.len();
            for mut task in spawned {
                task.id = fresh_task_id(board);
                board.tasks.push(task);
            }
            if count == 0 {
                Ok(Outcome::Unchanged(0))
            } else {
                Ok(Outcome::Changed(count))
            }
        })?;

        if created > 0 {
            debug!("weekly refresh created {created} tasks on board {}", self.board_id);
        }
        Ok(created)
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut BoardSnapshot, DateTime<Utc>) -> BoardResult<Outcome<T>>,
    ) -> BoardResult<T> {
        self.mutate_at(Utc::now(), op)
    }

    fn mutate_at<T>(
        &self,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut BoardSnapshot, DateTime<Utc>) -> BoardResult<Outcome<T>>,
    ) -> BoardResult<T> {
        let _guard = self.write_lock.lock();
        if self.is_retired() {
            return Err(BoardError::Removed(self.board_id.clone()));
        }

        let current = Arc::clone(&*self.committed.read());
        let mut draft = (*current).clone();
        let value = match op(&mut draft, now)? {
            Outcome::Unchanged(value) => return Ok(value),
            Outcome::Changed(value) => value,
        };

        // updated_at must move forward on every commit, even when two
        // commits land within one clock tick.
        draft.updated_at = if now > current.updated_at {
            now
        } else {
            current.updated_at + Duration::microseconds(1)
        };

        if let Err(err) = self.persistence.save_board(&self.board_id, &draft) {
            warn!(
                "cannot persist board {}, keeping last committed state: {err}",
                self.board_id
            );
            return Err(err.into());
        }

        *self.committed.write() = Arc::new(draft);
        self.notifier.publish(&self.board_id);
        Ok(value)
    }
}

fn required_text(value: &str, what: &str) -> BoardResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::invalid(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn fresh_task_id(board: &BoardSnapshot) -> String {
    loop {
        let id = Uuid::new_v4().simple().to_string();
        if board.find_task(&id).is_none() {
            return id;
        }
    }
}

fn week_number(monday: NaiveDate) -> usize {
    let epoch_monday = NaiveDate::from_ymd_opt(1970, 1, 5).unwrap_or(NaiveDate::MIN);
    let weeks = (monday - epoch_monday).num_days().div_euclid(7);
    usize::try_from(weeks).unwrap_or(0)
}
