//! Domain model for task lifecycle enforcement.
//!
//! The domain holds the task aggregate, the project-wide store snapshot, and
//! the pure rules over that snapshot: dependency resolution, the
//! single-active-task guard, and the transition table. No infrastructure
//! concern crosses this boundary.

pub mod activity;
mod error;
mod ids;
mod machine;
pub mod resolver;
mod status;
mod store;
mod task;

pub use error::{ParseTaskStatusError, TaskDomainError, TransitionError};
pub use ids::{ExternalRef, MutationId, Receipt, TaskId};
pub use machine::{PlannedTransition, plan_transition};
pub use status::{TaskStatus, TransitionEdge};
pub use store::{TaskFilter, TaskStore};
pub use task::{NewTask, PersistedTaskData, Task};
