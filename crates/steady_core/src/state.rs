use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::task::{Task, TaskId, TaskRecord};

pub const DEFAULT_TITLE: &str = "Today's Tasks";
pub const DEFAULT_APP_TITLE: &str = "Steady";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// The single application state every operation reads and mutates.
///
/// `tasks` is newest-created first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub title: String,
    pub app_title: String,
    pub theme: Theme,
    pub tasks: Vec<Task>,
    /// Stored task records that could not be turned into tasks. They are kept
    /// verbatim and written back on every save.
    pub(crate) unreadable: Vec<StoredTask>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
            theme: Theme::default(),
            tasks: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl AppState {
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    pub fn unreadable_records(&self) -> usize {
        self.unreadable.len()
    }

    pub(crate) fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id() == id)
    }
}

/// Serialized record stored under the well-known storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_app_title")]
    pub app_title: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub tasks: Vec<StoredTask>,
}

/// One entry of the stored task list. Entries that do not have the record
/// shape are carried as raw JSON so a single damaged entry never rejects the
/// whole state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredTask {
    Record(TaskRecord),
    Raw(serde_json::Value),
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_app_title() -> String {
    DEFAULT_APP_TITLE.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub migrated_fields: usize,
    pub skipped_records: usize,
}

impl PersistedState {
    /// Migrates legacy dates relative to `tz` and converts records into tasks,
    /// keeping aside any whose shape or creation day cannot be recovered.
    pub fn into_state<Tz: TimeZone>(self, tz: &Tz) -> (AppState, LoadReport) {
        let mut report = LoadReport::default();
        let mut tasks = Vec::with_capacity(self.tasks.len());
        let mut unreadable = Vec::new();
        for entry in self.tasks {
            let mut record = match entry {
                StoredTask::Record(record) => record,
                StoredTask::Raw(raw) => {
                    warn!(entry = %raw, "keeping task entry without the record shape aside");
                    report.skipped_records += 1;
                    unreadable.push(StoredTask::Raw(raw));
                    continue;
                }
            };
            report.migrated_fields += record.migrate_dates(tz);
            match Task::try_from(record.clone()) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    warn!(task_id = %record.id, %err, "keeping task record with unusable creation date aside");
                    report.skipped_records += 1;
                    unreadable.push(StoredTask::Record(record));
                }
            }
        }
        let state = AppState {
            title: self.title,
            app_title: self.app_title,
            theme: self.theme,
            tasks,
            unreadable,
        };
        (state, report)
    }
}

impl From<&AppState> for PersistedState {
    fn from(state: &AppState) -> Self {
        Self {
            title: state.title.clone(),
            app_title: state.app_title.clone(),
            theme: state.theme,
            tasks: state
                .tasks
                .iter()
                .map(|task| StoredTask::Record(TaskRecord::from(task)))
                .chain(state.unreadable.iter().cloned())
                .collect(),
        }
    }
}
