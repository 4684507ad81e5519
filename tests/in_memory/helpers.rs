//! Shared test helpers for in-memory integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskgate::task::{
    adapters::memory::{InMemoryTaskBackend, InMemoryTaskRepository},
    domain::{Task, TaskId, TaskStatus},
    services::{ExecutionMode, RegisterTaskRequest, RetryPolicy, TaskLifecycleService},
};

/// Service type wired to the in-memory adapters.
pub type TestService =
    TaskLifecycleService<InMemoryTaskRepository, InMemoryTaskBackend, DefaultClock>;

/// Service together with the backend it writes to.
pub struct Harness {
    pub backend: Arc<InMemoryTaskBackend>,
    pub repository: Arc<InMemoryTaskRepository>,
    pub service: TestService,
}

/// Statuses a fresh task passes through on its way to `Done`.
pub const TO_DONE: [TaskStatus; 4] = [
    TaskStatus::Ready,
    TaskStatus::InProgress,
    TaskStatus::Review,
    TaskStatus::Done,
];

/// Retry policy with millisecond delays.
#[must_use]
pub fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        timeout_ms: 500,
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

/// Builds a harness around `backend`.
#[must_use]
pub fn harness_with(backend: InMemoryTaskBackend) -> Harness {
    let backend = Arc::new(backend);
    let repository = Arc::new(InMemoryTaskRepository::new());
    let service = TaskLifecycleService::new(
        Arc::clone(&repository),
        Arc::clone(&backend),
        Arc::new(DefaultClock),
    )
    .with_retry_policy(quick_policy());
    Harness {
        backend,
        repository,
        service,
    }
}

/// Provides a harness over a permissive backend.
#[fixture]
pub fn harness() -> Harness {
    harness_with(InMemoryTaskBackend::new())
}

/// Parses a task id, panicking on invalid test input.
#[must_use]
pub fn id(raw: &str) -> TaskId {
    TaskId::new(raw).expect("valid task id")
}

/// Registers a task titled after its id.
///
/// # Errors
///
/// Returns an error when registration fails.
pub async fn register(
    service: &TestService,
    task_id: &str,
    dependencies: &[&str],
) -> Result<Task, eyre::Report> {
    let request = RegisterTaskRequest::new(task_id, format!("Task {task_id}"))
        .with_dependencies(dependencies.iter().copied());
    Ok(service.register_task(request).await?)
}

/// Applies each status in `path` to `task_id` in `mode`.
///
/// # Errors
///
/// Returns the first transition failure.
pub async fn advance(
    service: &TestService,
    task_id: &TaskId,
    path: &[TaskStatus],
    mode: ExecutionMode,
) -> Result<(), eyre::Report> {
    for status in path {
        service.transition(task_id, *status, mode).await?;
    }
    Ok(())
}
