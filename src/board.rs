//! Task board data model and the command payloads that mutate it.
//!
//! [`BoardSnapshot`] is both the persisted form and the read-only view handed
//! to presentation adapters, so its serde shape is the external contract:
//! camelCase keys, RFC 3339 timestamps, `"pending" | "done"` statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Weekly,
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Weekly => write!(f, "once per week"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoreTemplate {
    pub id: String,
    pub title: String,
    pub recurrence: Recurrence,
}

impl ChoreTemplate {
    pub fn weekly(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            recurrence: Recurrence::Weekly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreTask {
    pub id: String,
    pub title: String,
    pub assignee_name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl ChoreTask {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = match status {
            TaskStatus::Done => Some(self.completed_at.unwrap_or(now)),
            TaskStatus::Pending => None,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub people: Vec<String>,
    pub tasks: Vec<ChoreTask>,
    pub templates: Vec<ChoreTemplate>,
    pub updated_at: DateTime<Utc>,
}

impl BoardSnapshot {
    /// Fresh board: the configured members, one weekly template per chore.
    pub fn from_defaults(members: &[String], chores: &[String], now: DateTime<Utc>) -> Self {
        let mut templates: Vec<ChoreTemplate> = Vec::with_capacity(chores.len());
        for chore in chores {
            let id = unique_slug(chore, |candidate| {
                templates.iter().any(|template| template.id == candidate)
            });
            templates.push(ChoreTemplate::weekly(id, chore.clone()));
        }

        let mut people: Vec<String> = Vec::with_capacity(members.len());
        for member in members {
            if !people.contains(member) {
                people.push(member.clone());
            }
        }

        Self {
            people,
            tasks: Vec::new(),
            templates,
            updated_at: now,
        }
    }

    pub fn has_person(&self, name: &str) -> bool {
        self.people.iter().any(|person| person == name)
    }

    pub fn find_task(&self, id: &str) -> Option<&ChoreTask> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub(crate) fn find_task_mut(&mut self, id: &str) -> Option<&mut ChoreTask> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    pub fn find_template(&self, id: &str) -> Option<&ChoreTemplate> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_pending()).count()
    }

    pub fn done_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_done()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub assignee_name: String,
    #[serde(default)]
    pub template_id: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, assignee_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            assignee_name: assignee_name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
}

impl NewTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
        }
    }
}

/// Lower-case, dash-separated form of `title`, suffixed until `taken` says no.
pub(crate) fn unique_slug(title: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut base = String::with_capacity(title.len());
    for ch in title.trim().chars() {
        if ch.is_alphanumeric() {
            base.extend(ch.to_lowercase());
        } else if !base.ends_with('-') && !base.is_empty() {
            base.push('-');
        }
    }
    let base = base.trim_end_matches('-').to_string();
    let base = if base.is_empty() {
        "chore".to_string()
    } else {
        base
    };

    if !taken(&base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
