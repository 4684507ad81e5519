//! Single-active-task guard.
//!
//! Exclusivity is derived from the `status` field of the snapshot; there is
//! no separate lock object that could drift from the stored statuses. The
//! slot frees itself as soon as the holder leaves `InProgress`.

use super::{TaskId, TaskStore};

/// Returns `true` when `task_id` may occupy the active slot.
///
/// Succeeds when no task is `InProgress` or when `task_id` is the only one.
#[must_use]
pub fn try_acquire(task_id: &TaskId, store: &TaskStore) -> bool {
    conflicting_holder(task_id, store).is_none()
}

/// Returns the task, other than `task_id`, that currently holds the slot.
#[must_use]
pub fn conflicting_holder<'store>(
    task_id: &TaskId,
    store: &'store TaskStore,
) -> Option<&'store TaskId> {
    store
        .in_progress_ids()
        .into_iter()
        .find(|holder| *holder != task_id)
}
