use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    date_key::DateKey,
    engine,
    error::Result,
    rotation,
    state::{AppState, Theme},
    stats::{self, CalendarDay, ConsistencySummary},
    store::{KeyValueStore, MemoryStore, StateStore, DEFAULT_STORAGE_KEY},
    task::{Completion, Task, TaskId},
};

/// Handle on the application state: every read goes through it and every
/// mutation is applied, persisted and published under one write lock.
pub struct TrackerService {
    store: StateStore,
    state: RwLock<AppState>,
    clock: Arc<dyn Clock>,
}

pub struct TrackerServiceBuilder {
    backend: Option<Box<dyn KeyValueStore>>,
    storage_key: String,
    clock: Option<Arc<dyn Clock>>,
}

impl TrackerServiceBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            clock: None,
        }
    }

    pub fn with_store(mut self, backend: impl KeyValueStore + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Loads the stored state. Defaults to an in-memory store and the system clock.
    /// Fails when the store cannot be read.
    pub fn build(self) -> Result<TrackerService> {
        let backend = self
            .backend
            .unwrap_or_else(|| Box::new(MemoryStore::new()));
        let store = StateStore::new(backend, self.storage_key)?;
        let loaded = store.load()?;
        info!(
            key = store.key(),
            tasks = loaded.state.tasks.len(),
            skipped = loaded.report.skipped_records,
            fresh = loaded.fresh,
            "tracker state loaded"
        );
        Ok(TrackerService {
            store,
            state: RwLock::new(loaded.state),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

impl Default for TrackerServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerService {
    pub fn builder() -> TrackerServiceBuilder {
        TrackerServiceBuilder::new()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn today(&self) -> DateKey {
        self.clock.today()
    }

    /// `Ok(None)` when `text` is blank.
    #[tracing::instrument(skip(self, text))]
    pub fn create_task(&self, text: &str) -> Result<Option<Task>> {
        let today = self.today();
        self.mutate(|state| engine::create_task(state, text, today))
    }

    /// `Ok(None)` when no task has `id`.
    #[tracing::instrument(skip(self, id, viewed), fields(task_id = %id, viewed = %viewed))]
    pub fn toggle_checked(&self, id: &TaskId, viewed: DateKey) -> Result<Option<Completion>> {
        let today = self.today();
        self.mutate(|state| engine::toggle_checked(state, id, viewed, today))
    }

    /// Commits today's checked tasks; returns how many were newly committed.
    #[tracing::instrument(skip(self))]
    pub fn finalize_day(&self) -> Result<usize> {
        let today = self.today();
        let committed = self.mutate(|state| {
            let count = engine::finalize_day(state, today);
            (count > 0).then_some(count)
        })?;
        let committed = committed.unwrap_or(0);
        info!(day = %today, committed, "finalized day");
        Ok(committed)
    }

    #[tracing::instrument(skip(self, id), fields(task_id = %id))]
    pub fn delete_task(&self, id: &TaskId) -> Result<bool> {
        let removed = self.mutate(|state| engine::delete_task(state, id))?;
        Ok(removed.is_some())
    }

    pub fn set_title(&self, title: &str) -> Result<bool> {
        self.set_label(title, |state| &mut state.title)
    }

    pub fn set_app_title(&self, title: &str) -> Result<bool> {
        self.set_label(title, |state| &mut state.app_title)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.mutate(|state| (state.theme != theme).then(|| state.theme = theme))?;
        Ok(())
    }

    pub fn toggle_theme(&self) -> Result<Theme> {
        let theme = self.mutate(|state| {
            state.theme = state.theme.toggled();
            Some(state.theme)
        })?;
        Ok(theme.unwrap_or_default())
    }

    /// Replaces the in-memory state with whatever the store holds now. On a
    /// failed read the live state is kept.
    #[tracing::instrument(skip(self))]
    pub fn reload(&self) -> Result<()> {
        let mut live = self.state.write();
        match self.store.load() {
            Ok(loaded) => {
                *live = loaded.state;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "reload failed, keeping current state");
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    pub fn tasks_for_day(&self, day: DateKey) -> Vec<Task> {
        engine::tasks_for_day(&self.state.read(), day)
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state.read().task(id).cloned()
    }

    pub fn title(&self) -> String {
        self.state.read().title.clone()
    }

    pub fn app_title(&self) -> String {
        self.state.read().app_title.clone()
    }

    pub fn theme(&self) -> Theme {
        self.state.read().theme
    }

    pub fn summary(&self) -> ConsistencySummary {
        stats::summarize(&self.state.read().tasks, self.today())
    }

    pub fn year_calendar(&self, year: i32) -> Vec<CalendarDay> {
        let done = stats::done_dates(&self.state.read().tasks);
        stats::year_calendar(&done, year)
    }

    pub fn daily_message(&self) -> &'static str {
        rotation::daily_message(self.today())
    }
}

impl TrackerService {
    /// Applies `apply` to a draft copy; `None` means nothing changed. The draft
    /// replaces the live state only once it has been saved.
    fn mutate<T>(&self, apply: impl FnOnce(&mut AppState) -> Option<T>) -> Result<Option<T>> {
        let mut live = self.state.write();
        let mut draft = live.clone();
        let Some(outcome) = apply(&mut draft) else {
            debug!("mutation was a no-op");
            return Ok(None);
        };
        self.store.save(&draft)?;
        *live = draft;
        Ok(Some(outcome))
    }

    /// Labels follow the same rule as task text: blank is rejected.
    fn set_label(
        &self,
        raw: &str,
        field: impl FnOnce(&mut AppState) -> &mut String,
    ) -> Result<bool> {
        let label = raw.trim();
        if label.is_empty() {
            return Ok(false);
        }
        self.mutate(|state| {
            let slot = field(state);
            (slot.as_str() != label).then(|| *slot = label.to_string())
        })?;
        Ok(true)
    }
}
