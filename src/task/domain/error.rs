//! Error types for task domain validation, parsing, and transition guards.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or re-wiring domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task identifier is empty or contains whitespace.
    #[error("invalid task id '{0}', expected a non-empty token without whitespace")]
    InvalidTaskId(String),

    /// The external reference is empty.
    #[error("invalid external reference '{0}'")]
    InvalidExternalRef(String),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// A task listed itself as a dependency.
    #[error("task {0} cannot depend on itself")]
    SelfDependency(TaskId),

    /// Adding the dependency set would close a cycle in the graph.
    #[error("dependency cycle detected: {}", join_ids(.cycle, " -> "))]
    DependencyCycle {
        /// Task whose dependency set was rejected.
        task_id: TaskId,
        /// Path of ids forming the cycle, starting and ending at `task_id`.
        cycle: Vec<TaskId>,
    },

    /// Completed tasks keep the dependency set they were finished with.
    #[error("task {0} is done and its dependencies can no longer change")]
    DependenciesFrozen(TaskId),
}

/// Error returned while parsing task statuses from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Reasons the state machine refuses a requested transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The `(from, to)` pair is not an edge of the lifecycle table, or the
    /// edge's structural precondition does not hold.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidEdge {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Prerequisites have not reached `Done`.
    #[error(
        "task {task_id} is waiting on unfinished dependencies: {}",
        join_ids(.unmet, ", ")
    )]
    DependencyUnmet {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Dependencies that are not `Done` or not known to the store.
        unmet: Vec<TaskId>,
    },

    /// Another task already occupies the single active slot.
    #[error("task {task_id} cannot start while task {active} is in progress")]
    ActivityConflict {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Task currently holding the active slot.
        active: TaskId,
    },
}

fn join_ids(ids: &[TaskId], separator: &str) -> String {
    ids.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
