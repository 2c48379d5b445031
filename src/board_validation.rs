use crate::board::{BoardSnapshot, ChoreTask, TaskStatus};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BoardValidationError {
    message: String,
}

impl BoardValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn validate_task(task: &ChoreTask) -> Result<(), BoardValidationError> {
    if task.id.trim().is_empty() {
        return Err(BoardValidationError::new("task with empty id"));
    }
    if task.title.trim().is_empty() {
        return Err(BoardValidationError::new(format!(
            "task {} has an empty title",
            task.id
        )));
    }
    if task.status == TaskStatus::Pending && task.completed_at.is_some() {
        return Err(BoardValidationError::new(format!(
            "task {} is pending but has a completion time",
            task.id
        )));
    }
    if let Some(completed_at) = task.completed_at {
        if completed_at < task.created_at {
            return Err(BoardValidationError::new(format!(
                "task {} completed at {} before it was created at {}",
                task.id, completed_at, task.created_at
            )));
        }
    }
    Ok(())
}

/// Structural checks applied to every snapshot read from or written to
/// persistence.
pub fn validate_snapshot(snapshot: &BoardSnapshot) -> Result<(), BoardValidationError> {
    let mut names = HashSet::with_capacity(snapshot.people.len());
    for person in &snapshot.people {
        if person.trim().is_empty() {
            return Err(BoardValidationError::new("person with empty name"));
        }
        if !names.insert(person.as_str()) {
            return Err(BoardValidationError::new(format!(
                "duplicate person {person}"
            )));
        }
    }

    let mut template_ids = HashSet::with_capacity(snapshot.templates.len());
    for template in &snapshot.templates {
        if template.id.trim().is_empty() {
            return Err(BoardValidationError::new("template with empty id"));
        }
        if !template_ids.insert(template.id.as_str()) {
            return Err(BoardValidationError::new(format!(
                "duplicate template id {}",
                template.id
            )));
        }
    }

    let mut task_ids = HashSet::with_capacity(snapshot.tasks.len());
    for task in &snapshot.tasks {
        validate_task(task)?;
        if !task_ids.insert(task.id.as_str()) {
            return Err(BoardValidationError::new(format!(
                "duplicate task id {}",
                task.id
            )));
        }
    }

    Ok(())
}
