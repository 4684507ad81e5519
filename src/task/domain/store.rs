//! In-memory snapshot of every task in a project.

use super::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Mapping from task identifier to task record.
///
/// The resolver, activity guard, and state machine are pure functions over
/// this snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from existing task records.
    ///
    /// A later record replaces an earlier one with the same identifier.
    #[must_use]
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks
                .into_iter()
                .map(|task| (task.id().clone(), task))
                .collect(),
        }
    }

    /// Returns the task with the given identifier.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Returns `true` when the store knows the identifier.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` when the store holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterates over every task in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Returns the identifiers of every `InProgress` task, sorted.
    ///
    /// Holds at most one element while the single-active invariant holds.
    #[must_use]
    pub fn in_progress_ids(&self) -> BTreeSet<&TaskId> {
        self.tasks
            .values()
            .filter(|task| task.status() == TaskStatus::InProgress)
            .map(Task::id)
            .collect()
    }

    /// Returns the identifier of the task currently `InProgress`, if any.
    #[must_use]
    pub fn active_task_id(&self) -> Option<&TaskId> {
        self.in_progress_ids().into_iter().next()
    }

    /// Returns the tasks that list `id` as a dependency, sorted by id.
    #[must_use]
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&Task> {
        let mut dependents: Vec<&Task> = self
            .tasks
            .values()
            .filter(|task| task.dependencies().contains(id))
            .collect();
        dependents.sort_by(|left, right| left.id().cmp(right.id()));
        dependents
    }

    /// Returns clones of the tasks matching `filter`, sorted by id.
    #[must_use]
    pub fn select(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut selected: Vec<Task> = self
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect();
        selected.sort_by(|left, right| left.id().cmp(right.id()));
        selected
    }

    /// Inserts or replaces a task record.
    pub(crate) fn put(&mut self, task: Task) {
        self.tasks.insert(task.id().clone(), task);
    }
}

/// Optional criteria for listing tasks. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    statuses: BTreeSet<TaskStatus>,
    depends_on: Option<TaskId>,
}

impl TaskFilter {
    /// Creates a filter matching every task.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restricts results to the given status. Repeated calls widen the set.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    /// Restricts results to tasks that depend on `id`.
    #[must_use]
    pub fn depending_on(mut self, id: TaskId) -> Self {
        self.depends_on = Some(id);
        self
    }

    /// Returns `true` when `task` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let status_matches = self.statuses.is_empty() || self.statuses.contains(&task.status());
        let dependency_matches = self
            .depends_on
            .as_ref()
            .is_none_or(|id| task.dependencies().contains(id));
        status_matches && dependency_matches
    }
}
