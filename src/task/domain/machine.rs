//! Lifecycle state machine.
//!
//! [`plan_transition`] validates one requested transition against the edge
//! table and the edge's guard. It never mutates: the lifecycle service hands
//! the resulting [`PlannedTransition`] to the effect executor and commits it
//! only after the effect is acknowledged.

use super::{
    Task, TaskId, TaskStatus, TaskStore, TransitionEdge, TransitionError, activity, resolver,
};
use serde::{Deserialize, Serialize};

/// A transition that passed validation and awaits its effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTransition {
    task_id: TaskId,
    from: TaskStatus,
    to: TaskStatus,
    edge: TransitionEdge,
}

impl PlannedTransition {
    /// Returns the task being transitioned.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Returns the status the task leaves.
    #[must_use]
    pub const fn from(&self) -> TaskStatus {
        self.from
    }

    /// Returns the status the task enters.
    #[must_use]
    pub const fn to(&self) -> TaskStatus {
        self.to
    }

    /// Returns the lifecycle edge taken.
    #[must_use]
    pub const fn edge(&self) -> TransitionEdge {
        self.edge
    }

    /// Returns `true` when committing this transition must trigger the
    /// unblock cascade.
    #[must_use]
    pub const fn completes_task(&self) -> bool {
        matches!(self.edge, TransitionEdge::Approve)
    }
}

/// Validates moving `task` to `target` within `store`.
///
/// # Errors
///
/// - [`TransitionError::InvalidEdge`] when `(status, target)` is not in the
///   table, or when `Blocked` is requested while every dependency is met.
/// - [`TransitionError::DependencyUnmet`] for `* -> Ready` while a
///   dependency is not `Done`.
/// - [`TransitionError::ActivityConflict`] for `* -> InProgress` while a
///   different task holds the active slot.
pub fn plan_transition(
    task: &Task,
    target: TaskStatus,
    store: &TaskStore,
) -> Result<PlannedTransition, TransitionError> {
    let from = task.status();
    let invalid_edge = || TransitionError::InvalidEdge {
        task_id: task.id().clone(),
        from,
        to: target,
    };
    let edge = from.edge_to(target).ok_or_else(invalid_edge)?;

    match edge {
        TransitionEdge::Unblock => {
            let unmet = resolver::unmet_dependencies(task, store);
            if !unmet.is_empty() {
                return Err(TransitionError::DependencyUnmet {
                    task_id: task.id().clone(),
                    unmet,
                });
            }
        }
        TransitionEdge::Start | TransitionEdge::Rework => {
            if let Some(active) = activity::conflicting_holder(task.id(), store) {
                return Err(TransitionError::ActivityConflict {
                    task_id: task.id().clone(),
                    active: active.clone(),
                });
            }
        }
        TransitionEdge::Block => {
            if resolver::is_unblocked(task, store) {
                return Err(invalid_edge());
            }
        }
        TransitionEdge::Submit | TransitionEdge::Approve => {}
    }

    Ok(PlannedTransition {
        task_id: task.id().clone(),
        from,
        to: target,
        edge,
    })
}
