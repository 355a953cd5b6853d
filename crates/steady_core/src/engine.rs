//! Completion rules over an in-memory [`AppState`].
//!
//! Checking a task on the "today" view is tentative: it only reaches the
//! calendar through [`finalize_day`]. Checking a task while viewing any other
//! day stamps that day immediately.

use tracing::debug;

use crate::date_key::DateKey;
use crate::state::AppState;
use crate::task::{Completion, Task, TaskId};

/// Prepends a new task created on `today`. `None` if `text` is blank.
pub fn create_task(state: &mut AppState, text: &str, today: DateKey) -> Option<Task> {
    let task = Task::new(text, today)?;
    debug!(task_id = %task.id(), day = %today, "created task");
    state.tasks.insert(0, task.clone());
    Some(task)
}

/// Flips the checked state of `id` as seen from `viewed`. `None` for an unknown id.
pub fn toggle_checked(
    state: &mut AppState,
    id: &TaskId,
    viewed: DateKey,
    today: DateKey,
) -> Option<Completion> {
    let task = state.task_mut(id)?;
    let completion = if viewed == today {
        task.toggle_today()
    } else {
        task.toggle_on(viewed)
    };
    debug!(task_id = %id, viewed = %viewed, ?completion, "toggled task");
    Some(completion)
}

/// Commits every task created and checked on `today`. Returns how many changed;
/// already committed tasks are left alone.
pub fn finalize_day(state: &mut AppState, today: DateKey) -> usize {
    state
        .tasks
        .iter_mut()
        .filter(|task| task.created_at() == today)
        .map(|task| task.commit(today))
        .filter(|changed| *changed)
        .count()
}

pub fn delete_task(state: &mut AppState, id: &TaskId) -> Option<Task> {
    let idx = state.tasks.iter().position(|task| task.id() == id)?;
    Some(state.tasks.remove(idx))
}

pub fn tasks_for_day(state: &AppState, day: DateKey) -> Vec<Task> {
    state
        .tasks
        .iter()
        .filter(|task| task.created_at() == day)
        .cloned()
        .collect()
}
