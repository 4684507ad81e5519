//! Service layer for task registration, transitions, and queries.

use crate::task::{
    domain::{
        ExternalRef, NewTask, ParseTaskStatusError, PlannedTransition, Task, TaskDomainError,
        TaskFilter, TaskId, TaskStatus, TaskStore, TransitionError, plan_transition, resolver,
    },
    ports::{TaskBackend, TaskRepository, TaskRepositoryError},
    services::{
        EffectAck, EffectError, EffectExecutor, ExecutionMode, RetryPolicy, SimulatedMutation,
        StatusMutation,
    },
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Request payload for registering a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTaskRequest {
    id: String,
    title: String,
    dependencies: Vec<String>,
    external_ref: Option<String>,
    body: Option<String>,
    mode: ExecutionMode,
}

impl RegisterTaskRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            dependencies: Vec::new(),
            external_ref: None,
            body: None,
            mode: ExecutionMode::Live,
        }
    }

    /// Sets the identifiers of tasks that must be done first.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Links the task to an existing backend record.
    #[must_use]
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Sets the free-text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the mode used to settle pending unblocks before registering.
    /// Registration itself never writes to the backend.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Request payload for moving a task to another status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTaskRequest {
    task_id: TaskId,
    target_status: String,
    mode: ExecutionMode,
}

impl TransitionTaskRequest {
    /// Creates a live-mode request. The target is parsed when the request
    /// is served.
    #[must_use]
    pub fn new(task_id: TaskId, target_status: impl Into<String>) -> Self {
        Self {
            task_id,
            target_status: target_status.into(),
            mode: ExecutionMode::Live,
        }
    }

    /// Sets the execution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Switches the request to simulate mode.
    #[must_use]
    pub const fn simulated(self) -> Self {
        self.with_mode(ExecutionMode::Simulate)
    }
}

/// Request payload for replacing a task's dependency set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDependenciesRequest {
    task_id: TaskId,
    dependencies: Vec<String>,
    mode: ExecutionMode,
}

impl UpdateDependenciesRequest {
    /// Creates a live-mode request.
    #[must_use]
    pub fn new<I, S>(task_id: TaskId, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task_id,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            mode: ExecutionMode::Live,
        }
    }

    /// Sets the execution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A dependent whose automatic `Blocked -> Ready` step did not commit.
#[derive(Debug)]
pub struct CascadeFailure {
    /// Dependent that stays `Blocked`.
    pub task_id: TaskId,
    /// Why the step failed.
    pub error: TaskLifecycleError,
}

/// Result of a committed transition.
#[derive(Debug)]
pub struct TransitionOutcome {
    task: Task,
    ack: EffectAck,
    unblocked: Vec<Task>,
    cascade_failures: Vec<CascadeFailure>,
}

/// Dependents moved `Blocked -> Ready` by one pass, and those that failed.
#[derive(Debug, Default)]
struct UnblockReport {
    unblocked: Vec<Task>,
    failures: Vec<CascadeFailure>,
}

impl TransitionOutcome {
    fn new(task: Task, ack: EffectAck, settled: UnblockReport) -> Self {
        Self {
            task,
            ack,
            unblocked: settled.unblocked,
            cascade_failures: settled.failures,
        }
    }

    fn absorb(&mut self, report: UnblockReport) {
        self.unblocked.extend(report.unblocked);
        self.cascade_failures.extend(report.failures);
    }

    /// Returns the transitioned task.
    #[must_use]
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// Consumes the outcome, returning the transitioned task.
    #[must_use]
    pub fn into_task(self) -> Task {
        self.task
    }

    /// Returns the effect acknowledgement.
    #[must_use]
    pub const fn ack(&self) -> &EffectAck {
        &self.ack
    }

    /// Returns the dependents moved to `Ready`, including any left `Blocked`
    /// by an earlier interrupted or failed cascade.
    #[must_use]
    pub fn unblocked(&self) -> &[Task] {
        &self.unblocked
    }

    /// Returns the cascade steps that failed.
    #[must_use]
    pub fn cascade_failures(&self) -> &[CascadeFailure] {
        &self.cascade_failures
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The requested status string is not a known status.
    #[error(transparent)]
    InvalidState(#[from] ParseTaskStatusError),
    /// The state machine refused the transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// The effect executor could not externalize the change.
    #[error(transparent)]
    Effect(#[from] EffectError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// No task exists with the given identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),
}

/// Flat classification of [`TaskLifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskErrorKind {
    /// See [`TaskLifecycleError::Domain`].
    Domain,
    /// See [`TaskLifecycleError::InvalidState`].
    InvalidState,
    /// See [`TransitionError::InvalidEdge`].
    InvalidEdge,
    /// See [`TransitionError::DependencyUnmet`].
    DependencyUnmet,
    /// See [`TransitionError::ActivityConflict`].
    ActivityConflict,
    /// See [`TaskLifecycleError::Effect`].
    Effect,
    /// See [`TaskLifecycleError::Repository`].
    Repository,
    /// See [`TaskLifecycleError::NotFound`].
    NotFound,
}

impl TaskLifecycleError {
    /// Returns the error's kind.
    #[must_use]
    pub const fn kind(&self) -> TaskErrorKind {
        match self {
            Self::Domain(_) => TaskErrorKind::Domain,
            Self::InvalidState(_) => TaskErrorKind::InvalidState,
            Self::Transition(TransitionError::InvalidEdge { .. }) => TaskErrorKind::InvalidEdge,
            Self::Transition(TransitionError::DependencyUnmet { .. }) => {
                TaskErrorKind::DependencyUnmet
            }
            Self::Transition(TransitionError::ActivityConflict { .. }) => {
                TaskErrorKind::ActivityConflict
            }
            Self::Effect(_) => TaskErrorKind::Effect,
            Self::Repository(_) => TaskErrorKind::Repository,
            Self::NotFound(_) => TaskErrorKind::NotFound,
        }
    }
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Every mutation holds the mutation gate from snapshot through guard check,
/// effect, and commit, so exactly one transition is validated and applied at
/// a time. Queries read the repository directly and never wait on a backend
/// call.
pub struct TaskLifecycleService<R, B, C>
where
    R: TaskRepository,
    B: TaskBackend,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    effects: EffectExecutor<B, C>,
    clock: Arc<C>,
    mutation_gate: Mutex<()>,
}

impl<R, B, C> TaskLifecycleService<R, B, C>
where
    R: TaskRepository,
    B: TaskBackend,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(repository: Arc<R>, backend: Arc<B>, clock: Arc<C>) -> Self {
        Self {
            repository,
            effects: EffectExecutor::new(backend, Arc::clone(&clock)),
            clock,
            mutation_gate: Mutex::new(()),
        }
    }

    /// Replaces the retry policy applied to backend calls.
    #[must_use]
    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        Self {
            effects: self.effects.with_policy(policy),
            ..self
        }
    }

    /// Registers a new task.
    ///
    /// The task starts `Blocked` when any dependency is not yet `Done`, and
    /// `Todo` otherwise. Unknown dependency ids are accepted and logged.
    /// Tasks left `Blocked` with every dependency `Done` are moved to `Ready`
    /// first, in the request's mode.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for invalid input, a
    /// self-dependency, or a dependency cycle, and
    /// [`TaskLifecycleError::Repository`] for duplicate ids or persistence
    /// failures.
    pub async fn register_task(&self, request: RegisterTaskRequest) -> TaskLifecycleResult<Task> {
        let id = TaskId::new(request.id)?;
        let dependencies = parse_ids(request.dependencies)?;
        let mut new_task = NewTask::new(id, request.title)?.with_dependencies(dependencies);
        if let Some(external_ref) = request.external_ref {
            new_task = new_task.with_external_ref(ExternalRef::new(external_ref)?);
        }
        if let Some(body) = request.body {
            new_task = new_task.with_body(body);
        }

        let _gate = self.mutation_gate.lock().await;
        let mut store = self.repository.snapshot().await?;
        self.unblock_ready(&mut store, request.mode, None).await;
        if store.contains(new_task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(new_task.id().clone()).into());
        }
        resolver::validate_dependencies(new_task.id(), new_task.dependencies(), &store)?;
        warn_unknown_dependencies(new_task.id(), new_task.dependencies(), &store);

        let initial_status = if resolver::unmet_in(new_task.dependencies(), &store).is_empty() {
            TaskStatus::Todo
        } else {
            TaskStatus::Blocked
        };
        let task = Task::register(new_task, initial_status, &*self.clock);
        self.repository.store(&task).await?;
        info!(
            task_id = %task.id(),
            status = %task.status(),
            dependencies = task.dependencies().len(),
            "registered task"
        );
        Ok(task)
    }

    /// Serves a transition request whose target is given as text.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::InvalidState`] when the target does not
    /// parse, otherwise as [`Self::transition`].
    pub async fn request_transition(
        &self,
        request: TransitionTaskRequest,
    ) -> TaskLifecycleResult<TransitionOutcome> {
        let target = TaskStatus::try_from(request.target_status.as_str())?;
        self.transition(&request.task_id, target, request.mode).await
    }

    /// Moves a task to `target`, the single public mutation path for status.
    ///
    /// On a `Review -> Done` commit every dependent whose prerequisites are
    /// now met is moved `Blocked -> Ready` through the same guarded path and
    /// in the same mode. Dependents a previous cascade left `Blocked` are
    /// promoted before the request is planned.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks,
    /// [`TaskLifecycleError::Transition`] when the state machine rejects the
    /// request, and [`TaskLifecycleError::Effect`] when the live write fails.
    /// The requested task is unchanged in every error case.
    pub async fn transition(
        &self,
        task_id: &TaskId,
        target: TaskStatus,
        mode: ExecutionMode,
    ) -> TaskLifecycleResult<TransitionOutcome> {
        let _gate = self.mutation_gate.lock().await;
        let mut store = self.repository.snapshot().await?;
        let requested_unblock = (target == TaskStatus::Ready).then_some(task_id);
        let settled = self.unblock_ready(&mut store, mode, requested_unblock).await;
        let task = find_in(&store, task_id)?;
        let plan = plan_transition(&task, target, &store)
            .inspect_err(|rejection| report_rejection(rejection, &store))?;

        let (updated, ack) = self.commit(&task, &plan, mode).await?;
        store.put(updated.clone());
        let mut outcome = TransitionOutcome::new(updated, ack, settled);
        if plan.completes_task() {
            let cascade = self.unblock_ready(&mut store, mode, None).await;
            debug!(
                completed = %outcome.task.id(),
                unblocked = cascade.unblocked.len(),
                failed = cascade.failures.len(),
                "unblock cascade finished"
            );
            outcome.absorb(cascade);
        }
        Ok(outcome)
    }

    /// Replaces a task's dependency set.
    ///
    /// When the new set is unmet the task is moved to `Blocked`, and a
    /// `Blocked` task whose new set is met moves to `Ready`. The new set and
    /// the new status are committed together after the effect succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for invalid ids, cycles, or a
    /// `Done` task, [`TaskLifecycleError::NotFound`] for unknown tasks, and
    /// [`TaskLifecycleError::Effect`] when the blocking write fails.
    pub async fn update_dependencies(
        &self,
        request: UpdateDependenciesRequest,
    ) -> TaskLifecycleResult<Task> {
        let dependencies = parse_ids(request.dependencies)?;

        let _gate = self.mutation_gate.lock().await;
        let mut store = self.repository.snapshot().await?;
        self.unblock_ready(&mut store, request.mode, Some(&request.task_id))
            .await;
        let mut candidate = find_in(&store, &request.task_id)?;
        if candidate.status().is_terminal() {
            return Err(TaskDomainError::DependenciesFrozen(candidate.id().clone()).into());
        }
        resolver::validate_dependencies(candidate.id(), &dependencies, &store)?;
        warn_unknown_dependencies(candidate.id(), &dependencies, &store);

        candidate.replace_dependencies(dependencies, &*self.clock);
        store.put(candidate.clone());

        let met = resolver::is_unblocked(&candidate, &store);
        let target = match (candidate.status(), met) {
            (TaskStatus::Blocked, true) => TaskStatus::Ready,
            (status, false) if status != TaskStatus::Blocked => TaskStatus::Blocked,
            _ => {
                self.repository.update(&candidate).await?;
                debug!(task_id = %candidate.id(), "replaced dependencies");
                return Ok(candidate);
            }
        };

        let plan = plan_transition(&candidate, target, &store)?;
        let (moved, _) = self.commit(&candidate, &plan, request.mode).await?;
        Ok(moved)
    }

    /// Adopts the backend's title and body for a task.
    ///
    /// A differing backend status is logged and ignored; the core stays
    /// authoritative for status.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Effect`] when the backend read fails.
    pub async fn refresh_task(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        let _gate = self.mutation_gate.lock().await;
        let mut task = self.get_task(task_id).await?;
        let snapshot = self.effects.fetch(task.id(), task.external_ref()).await?;
        if let Some(backend_status) = snapshot.status.filter(|status| *status != task.status()) {
            warn!(
                task_id = %task.id(),
                core_status = %task.status(),
                backend_status = %backend_status,
                "backend status differs from core status"
            );
        }
        task.refresh_metadata(&snapshot.title, snapshot.body, &*self.clock)?;
        self.repository.update(&task).await?;
        Ok(task)
    }

    /// Returns a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn get_task(&self, task_id: &TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| TaskLifecycleError::NotFound(task_id.clone()))
    }

    /// Lists tasks matching `filter`, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns persistence-layer errors from the repository.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list(filter).await?)
    }

    /// Returns the task currently `InProgress`, if any.
    ///
    /// # Errors
    ///
    /// Returns persistence-layer errors from the repository.
    pub async fn active_task(&self) -> TaskLifecycleResult<Option<Task>> {
        let store = self.repository.snapshot().await?;
        Ok(store.active_task_id().and_then(|id| store.get(id)).cloned())
    }

    /// Returns the mutations withheld by simulate mode so far.
    #[must_use]
    pub fn simulated_mutations(&self) -> Vec<SimulatedMutation> {
        self.effects.simulated_mutations()
    }

    /// Ends the simulated session and returns its journal.
    pub fn clear_simulation(&self) -> Vec<SimulatedMutation> {
        self.effects.clear_simulation()
    }

    async fn commit(
        &self,
        task: &Task,
        plan: &PlannedTransition,
        mode: ExecutionMode,
    ) -> TaskLifecycleResult<(Task, EffectAck)> {
        let mutation = StatusMutation::for_transition(plan, task.external_ref().clone());
        let ack = self.effects.apply(&mutation, mode).await?;

        let mut updated = task.clone();
        updated.apply_status(plan.to(), ack.receipt().clone(), &*self.clock);
        self.repository.update(&updated).await?;
        info!(
            task_id = %updated.id(),
            from = %plan.from(),
            to = %plan.to(),
            mode = %mode,
            receipt = %ack.receipt(),
            "committed transition"
        );
        Ok((updated, ack))
    }

    /// Moves every `Blocked` task whose dependencies are all `Done` to
    /// `Ready`, skipping `except`. Runs after each `Done` commit and at the
    /// start of every mutation, so a cascade cut short by cancellation or a
    /// failed write is finished by the next one.
    async fn unblock_ready(
        &self,
        store: &mut TaskStore,
        mode: ExecutionMode,
        except: Option<&TaskId>,
    ) -> UnblockReport {
        let mut report = UnblockReport::default();
        let pending = resolver::recompute_blocked(store)
            .into_iter()
            .filter(|pending_id| Some(pending_id) != except);
        for dependent_id in pending {
            let Some(dependent) = store.get(&dependent_id).cloned() else {
                continue;
            };
            let result = match plan_transition(&dependent, TaskStatus::Ready, store) {
                Ok(plan) => self.commit(&dependent, &plan, mode).await,
                Err(rejection) => Err(rejection.into()),
            };
            match result {
                Ok((unblocked, _)) => {
                    store.put(unblocked.clone());
                    report.unblocked.push(unblocked);
                }
                Err(error) => {
                    warn!(task_id = %dependent_id, error = %error, "dependent stays blocked");
                    report.failures.push(CascadeFailure {
                        task_id: dependent_id,
                        error,
                    });
                }
            }
        }
        report
    }
}

fn parse_ids(raw: Vec<String>) -> Result<BTreeSet<TaskId>, TaskDomainError> {
    raw.into_iter().map(TaskId::new).collect()
}

fn find_in(store: &TaskStore, task_id: &TaskId) -> TaskLifecycleResult<Task> {
    store
        .get(task_id)
        .cloned()
        .ok_or_else(|| TaskLifecycleError::NotFound(task_id.clone()))
}

fn warn_unknown_dependencies(task_id: &TaskId, dependencies: &BTreeSet<TaskId>, store: &TaskStore) {
    for unknown in resolver::unknown_in(dependencies, store) {
        warn!(
            task_id = %task_id,
            dependency = %unknown,
            "dependency is not registered; task stays blocked until it is"
        );
    }
}

fn report_rejection(rejection: &TransitionError, store: &TaskStore) {
    match rejection {
        TransitionError::DependencyUnmet { task_id, unmet } => {
            let unmet_set: BTreeSet<TaskId> = unmet.iter().cloned().collect();
            warn_unknown_dependencies(task_id, &unmet_set, store);
            debug!(task_id = %task_id, unmet = unmet.len(), "transition waits on dependencies");
        }
        TransitionError::ActivityConflict { task_id, active } => {
            debug!(task_id = %task_id, active = %active, "active slot is taken");
        }
        TransitionError::InvalidEdge { task_id, from, to } => {
            debug!(task_id = %task_id, from = %from, to = %to, "edge not in lifecycle table");
        }
    }
}
