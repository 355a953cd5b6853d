use std::fmt;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::date_key::{self, DateKey, DateKeyError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for TaskId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checked state of a task together with the day its completion counts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Completion {
    #[default]
    Unchecked,
    /// Checked on the "today" view but not yet finalized onto the calendar.
    Pending,
    Committed(DateKey),
}

impl Completion {
    pub fn is_checked(self) -> bool {
        !matches!(self, Completion::Unchecked)
    }

    pub fn committed_on(self) -> Option<DateKey> {
        match self {
            Completion::Committed(day) => Some(day),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    text: String,
    created_at: DateKey,
    completion: Completion,
}

impl Task {
    /// `None` when `text` is blank once trimmed.
    pub fn new(text: &str, created_at: DateKey) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: TaskId::generate(),
            text: text.to_string(),
            created_at,
            completion: Completion::Unchecked,
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateKey {
        self.created_at
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_checked()
    }

    pub fn completed_at(&self) -> Option<DateKey> {
        self.completion.committed_on()
    }

    /// Toggle from the "today" view: the calendar is not touched, except that
    /// unchecking a committed task withdraws its date.
    pub(crate) fn toggle_today(&mut self) -> Completion {
        self.completion = match self.completion {
            Completion::Unchecked => Completion::Pending,
            Completion::Pending | Completion::Committed(_) => Completion::Unchecked,
        };
        self.completion
    }

    /// Retroactive toggle while viewing `day`; checking commits immediately.
    pub(crate) fn toggle_on(&mut self, day: DateKey) -> Completion {
        self.completion = match self.completion {
            Completion::Unchecked => Completion::Committed(day),
            Completion::Pending | Completion::Committed(_) => Completion::Unchecked,
        };
        self.completion
    }

    /// Returns true when a pending check became committed.
    pub(crate) fn commit(&mut self, day: DateKey) -> bool {
        if self.completion == Completion::Pending {
            self.completion = Completion::Committed(day);
            return true;
        }
        false
    }
}

/// Two-field persisted shape of a task (`completed` + nullable `completedAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl TaskRecord {
    /// Rewrites legacy timestamp-shaped dates into local keys in place.
    /// Returns how many fields changed.
    pub fn migrate_dates<Tz: TimeZone>(&mut self, tz: &Tz) -> usize {
        let mut migrated = 0;
        if let Some(fixed) = migrate_field(&self.created_at, tz) {
            self.created_at = fixed;
            migrated += 1;
        }
        if let Some(fixed) = self.completed_at.as_deref().and_then(|raw| migrate_field(raw, tz)) {
            self.completed_at = Some(fixed);
            migrated += 1;
        }
        migrated
    }
}

fn migrate_field<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<String> {
    if !date_key::is_legacy_key(raw) {
        return None;
    }
    date_key::migrate_legacy_key(raw, tz).map(|key| key.to_string())
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.0.clone(),
            text: task.text.clone(),
            completed: task.is_completed(),
            created_at: task.created_at.to_string(),
            completed_at: task.completed_at().map(|day| day.to_string()),
        }
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = DateKeyError;

    /// `createdAt` must be a valid key. A `completedAt` on an unchecked record is
    /// dropped, and an unreadable one on a checked record leaves it pending.
    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let created_at = DateKey::parse(&record.created_at)?;
        let committed = record
            .completed_at
            .as_deref()
            .and_then(|raw| DateKey::parse(raw).ok());
        let completion = match (record.completed, committed) {
            (false, _) => Completion::Unchecked,
            (true, Some(day)) => Completion::Committed(day),
            (true, None) => Completion::Pending,
        };
        Ok(Self {
            id: TaskId(record.id),
            text: record.text,
            created_at,
            completion,
        })
    }
}
