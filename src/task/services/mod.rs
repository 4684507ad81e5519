//! Application services for task lifecycle orchestration.

mod effects;
mod lifecycle;
mod policy;

pub use effects::{
    EffectAck, EffectError, EffectExecutor, ExecutionMode, SimulatedMutation, StatusMutation,
};
pub use lifecycle::{
    CascadeFailure, RegisterTaskRequest, TaskErrorKind, TaskLifecycleError, TaskLifecycleResult,
    TaskLifecycleService, TransitionOutcome, TransitionTaskRequest, UpdateDependenciesRequest,
};
pub use policy::RetryPolicy;
