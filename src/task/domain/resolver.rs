//! Dependency resolution over a [`TaskStore`] snapshot.
//!
//! Every function here is a pure read. A dependency id the store does not
//! know never resolves: the dependent stays blocked and callers surface the
//! unknown id as a warning.

use super::{Task, TaskDomainError, TaskId, TaskStatus, TaskStore};
use std::collections::{BTreeSet, HashSet};

/// Returns `true` when every dependency of `task` is `Done` in `store`.
///
/// Vacuously true for an empty dependency set.
#[must_use]
pub fn is_unblocked(task: &Task, store: &TaskStore) -> bool {
    task.dependencies()
        .iter()
        .all(|dependency| is_done(dependency, store))
}

/// Returns the dependencies of `task` that are not `Done`, sorted.
///
/// Unknown ids are included.
#[must_use]
pub fn unmet_dependencies(task: &Task, store: &TaskStore) -> Vec<TaskId> {
    unmet_in(task.dependencies(), store)
}

/// Returns the ids in `dependencies` that are not `Done` in `store`.
#[must_use]
pub fn unmet_in(dependencies: &BTreeSet<TaskId>, store: &TaskStore) -> Vec<TaskId> {
    dependencies
        .iter()
        .filter(|dependency| !is_done(dependency, store))
        .cloned()
        .collect()
}

/// Returns the ids in `dependencies` that the store does not know.
#[must_use]
pub fn unknown_in(dependencies: &BTreeSet<TaskId>, store: &TaskStore) -> Vec<TaskId> {
    dependencies
        .iter()
        .filter(|dependency| !store.contains(dependency))
        .cloned()
        .collect()
}

/// Returns the `Blocked` tasks whose dependencies are now all `Done`.
///
/// Drives the unblock cascade after a `Done` commit and before every other
/// mutation.
#[must_use]
pub fn recompute_blocked(store: &TaskStore) -> BTreeSet<TaskId> {
    store
        .iter()
        .filter(|task| task.status() == TaskStatus::Blocked)
        .filter(|task| is_unblocked(task, store))
        .map(|task| task.id().clone())
        .collect()
}

/// Checks a proposed dependency set for `task_id` against the graph.
///
/// # Errors
///
/// Returns [`TaskDomainError::SelfDependency`] when the set names the task
/// itself and [`TaskDomainError::DependencyCycle`] when it would close a
/// cycle through tasks already in the store.
pub fn validate_dependencies(
    task_id: &TaskId,
    dependencies: &BTreeSet<TaskId>,
    store: &TaskStore,
) -> Result<(), TaskDomainError> {
    if dependencies.contains(task_id) {
        return Err(TaskDomainError::SelfDependency(task_id.clone()));
    }
    match find_cycle(task_id, dependencies, store) {
        Some(cycle) => Err(TaskDomainError::DependencyCycle {
            task_id: task_id.clone(),
            cycle,
        }),
        None => Ok(()),
    }
}

/// Searches for a path from `task_id` back to itself when its dependencies
/// are replaced by `dependencies`.
///
/// The rest of the graph is assumed acyclic, so any cycle must pass through
/// `task_id`. Returns the path starting and ending at `task_id`.
#[must_use]
pub fn find_cycle(
    task_id: &TaskId,
    dependencies: &BTreeSet<TaskId>,
    store: &TaskStore,
) -> Option<Vec<TaskId>> {
    let mut visited = HashSet::new();
    let mut path = vec![task_id.clone()];
    for dependency in dependencies {
        if visit(task_id, dependency, store, &mut visited, &mut path) {
            return Some(path);
        }
    }
    None
}

fn visit(
    origin: &TaskId,
    node: &TaskId,
    store: &TaskStore,
    visited: &mut HashSet<TaskId>,
    path: &mut Vec<TaskId>,
) -> bool {
    path.push(node.clone());
    if node == origin {
        return true;
    }
    if visited.insert(node.clone()) {
        if let Some(task) = store.get(node) {
            for dependency in task.dependencies() {
                if visit(origin, dependency, store, visited, path) {
                    return true;
                }
            }
        }
    }
    path.pop();
    false
}

fn is_done(id: &TaskId, store: &TaskStore) -> bool {
    store
        .get(id)
        .is_some_and(|task| task.status() == TaskStatus::Done)
}
