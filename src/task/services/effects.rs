//! Effect executor: the single chokepoint that externalizes status changes.
//!
//! Both execution modes run the same precondition checks. `Live` performs the
//! backend write under the [`RetryPolicy`]; `Simulate` performs no write,
//! mints a deterministic placeholder receipt, and journals the mutation that
//! would have happened. Callers commit the store change identically in both
//! modes once [`EffectExecutor::apply`] returns.

use crate::task::{
    domain::{ExternalRef, MutationId, PlannedTransition, Receipt, TaskId, TaskStatus},
    ports::{StatusWrite, TaskBackend, TaskBackendError, TaskBackendResult, TaskSnapshot},
    services::RetryPolicy,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Whether a mutation reaches the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Write to the backend and wait for its acknowledgement.
    #[default]
    Live,
    /// Validate and journal without any external write.
    Simulate,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Simulate => "simulate",
        })
    }
}

/// A validated status change ready to be externalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMutation {
    mutation_id: MutationId,
    task_id: TaskId,
    external_ref: ExternalRef,
    from: TaskStatus,
    to: TaskStatus,
}

impl StatusMutation {
    /// Builds a mutation with a fresh mutation id.
    ///
    /// The pair is not checked here; [`EffectExecutor::apply`] refuses pairs
    /// that are not lifecycle edges.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        external_ref: ExternalRef,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Self {
        Self {
            mutation_id: MutationId::new(),
            task_id,
            external_ref,
            from,
            to,
        }
    }

    /// Builds the mutation for a planned transition.
    #[must_use]
    pub fn for_transition(plan: &PlannedTransition, external_ref: ExternalRef) -> Self {
        Self::new(plan.task_id().clone(), external_ref, plan.from(), plan.to())
    }

    /// Returns the idempotency key.
    #[must_use]
    pub const fn mutation_id(&self) -> MutationId {
        self.mutation_id
    }

    /// Returns the task being changed.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Returns the backend handle.
    #[must_use]
    pub const fn external_ref(&self) -> &ExternalRef {
        &self.external_ref
    }

    /// Returns the status being left.
    #[must_use]
    pub const fn from(&self) -> TaskStatus {
        self.from
    }

    /// Returns the status being entered.
    #[must_use]
    pub const fn to(&self) -> TaskStatus {
        self.to
    }
}

/// Acknowledgement that a mutation took effect (or would have).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectAck {
    mutation_id: MutationId,
    receipt: Receipt,
    mode: ExecutionMode,
}

impl EffectAck {
    /// Returns the acknowledged mutation.
    #[must_use]
    pub const fn mutation_id(&self) -> MutationId {
        self.mutation_id
    }

    /// Returns the backend receipt, or the placeholder in simulate mode.
    #[must_use]
    pub const fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    /// Returns the mode the mutation ran in.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// Journal entry describing a write that simulate mode withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedMutation {
    /// Position within the simulated session, starting at 1.
    pub sequence: u64,
    /// The mutation that would have been written.
    pub mutation: StatusMutation,
    /// Placeholder receipt standing in for the backend's.
    pub receipt: Receipt,
    /// When the mutation was journaled.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SimulationJournal {
    last_sequence: u64,
    records: Vec<SimulatedMutation>,
}

/// Errors surfaced by the effect executor.
#[derive(Debug, Clone, Error)]
pub enum EffectError {
    /// The mutation does not follow a lifecycle edge.
    #[error("mutation {mutation_id} for task {task_id} is not a lifecycle edge ({from} -> {to})")]
    InvalidMutation {
        /// Rejected mutation.
        mutation_id: MutationId,
        /// Task the mutation targeted.
        task_id: TaskId,
        /// Status being left.
        from: TaskStatus,
        /// Status being entered.
        to: TaskStatus,
    },

    /// No attempt finished within the configured timeout.
    #[error("backend call for task {task_id} timed out after {attempts} attempt(s)")]
    TimedOut {
        /// Task the call concerned.
        task_id: TaskId,
        /// Attempts made.
        attempts: u32,
    },

    /// The backend returned an error.
    #[error("backend call for task {task_id} failed after {attempts} attempt(s): {source}")]
    Backend {
        /// Task the call concerned.
        task_id: TaskId,
        /// Attempts made.
        attempts: u32,
        /// Last backend error.
        source: TaskBackendError,
    },
}

impl EffectError {
    /// Returns how many backend attempts were made before giving up.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::InvalidMutation { .. } => 0,
            Self::TimedOut { attempts, .. } | Self::Backend { attempts, .. } => *attempts,
        }
    }
}

enum AttemptFailure {
    Backend(TaskBackendError),
    TimedOut,
}

impl AttemptFailure {
    const fn is_transient(&self) -> bool {
        match self {
            Self::Backend(error) => error.is_transient(),
            Self::TimedOut => true,
        }
    }

    const fn suggested_delay(&self) -> Option<Duration> {
        match self {
            Self::Backend(TaskBackendError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }

    fn into_effect_error(self, task_id: &TaskId, attempts: u32) -> EffectError {
        match self {
            Self::Backend(source) => EffectError::Backend {
                task_id: task_id.clone(),
                attempts,
                source,
            },
            Self::TimedOut => EffectError::TimedOut {
                task_id: task_id.clone(),
                attempts,
            },
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(error) => write!(f, "{error}"),
            Self::TimedOut => f.write_str("attempt timed out"),
        }
    }
}

/// Dual-mode executor mediating between validated changes and the backend.
pub struct EffectExecutor<B, C>
where
    B: TaskBackend,
    C: Clock + Send + Sync,
{
    backend: Arc<B>,
    clock: Arc<C>,
    policy: RetryPolicy,
    journal: Mutex<SimulationJournal>,
}

impl<B, C> EffectExecutor<B, C>
where
    B: TaskBackend,
    C: Clock + Send + Sync,
{
    /// Creates an executor with the default retry policy.
    #[must_use]
    pub fn new(backend: Arc<B>, clock: Arc<C>) -> Self {
        Self {
            backend,
            clock,
            policy: RetryPolicy::default(),
            journal: Mutex::new(SimulationJournal::default()),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Externalizes `mutation` in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::InvalidMutation`] in either mode when the
    /// mutation is not a lifecycle edge. In live mode, returns
    /// [`EffectError::TimedOut`] or [`EffectError::Backend`] once the retry
    /// policy gives up; nothing should be committed in that case.
    pub async fn apply(
        &self,
        mutation: &StatusMutation,
        mode: ExecutionMode,
    ) -> Result<EffectAck, EffectError> {
        check_preconditions(mutation)?;
        match mode {
            ExecutionMode::Live => self.write_live(mutation).await,
            ExecutionMode::Simulate => Ok(self.record_simulated(mutation)),
        }
    }

    /// Reads the backend snapshot for a task. Reads are always safe to
    /// retry.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::TimedOut`] or [`EffectError::Backend`] once
    /// the retry policy gives up.
    pub async fn fetch(
        &self,
        task_id: &TaskId,
        external_ref: &ExternalRef,
    ) -> Result<TaskSnapshot, EffectError> {
        self.call_with_retry(task_id, "fetch_task", true, || {
            self.backend.fetch_task(external_ref)
        })
        .await
    }

    /// Returns the journal of simulated mutations, oldest first.
    #[must_use]
    pub fn simulated_mutations(&self) -> Vec<SimulatedMutation> {
        self.lock_journal().records.clone()
    }

    /// Ends the simulated session: returns its journal and restarts
    /// placeholder numbering.
    pub fn clear_simulation(&self) -> Vec<SimulatedMutation> {
        let mut journal = self.lock_journal();
        journal.last_sequence = 0;
        std::mem::take(&mut journal.records)
    }

    async fn write_live(&self, mutation: &StatusMutation) -> Result<EffectAck, EffectError> {
        let write = StatusWrite {
            mutation_id: mutation.mutation_id(),
            status: mutation.to(),
        };
        let retry_allowed = self.backend.idempotent_writes();
        let ack = self
            .call_with_retry(mutation.task_id(), "write_status", retry_allowed, || {
                self.backend.write_status(mutation.external_ref(), &write)
            })
            .await?;
        Ok(EffectAck {
            mutation_id: mutation.mutation_id(),
            receipt: ack.receipt,
            mode: ExecutionMode::Live,
        })
    }

    fn record_simulated(&self, mutation: &StatusMutation) -> EffectAck {
        let mut journal = self.lock_journal();
        journal.last_sequence = journal.last_sequence.saturating_add(1);
        let sequence = journal.last_sequence;
        let receipt = Receipt::placeholder(sequence);
        journal.records.push(SimulatedMutation {
            sequence,
            mutation: mutation.clone(),
            receipt: receipt.clone(),
            recorded_at: self.clock.utc(),
        });

        info!(
            mutation_id = %mutation.mutation_id(),
            task_id = %mutation.task_id(),
            external_ref = %mutation.external_ref(),
            from = %mutation.from(),
            to = %mutation.to(),
            receipt = %receipt,
            "simulated status write"
        );

        EffectAck {
            mutation_id: mutation.mutation_id(),
            receipt,
            mode: ExecutionMode::Simulate,
        }
    }

    async fn call_with_retry<T, F, Fut>(
        &self,
        task_id: &TaskId,
        operation: &'static str,
        retry_allowed: bool,
        mut call: F,
    ) -> Result<T, EffectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TaskBackendResult<T>>,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let failure = match tokio::time::timeout(self.policy.timeout(), call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => AttemptFailure::Backend(error),
                Err(_elapsed) => AttemptFailure::TimedOut,
            };

            let may_retry =
                retry_allowed && failure.is_transient() && attempts <= self.policy.max_retries;
            if !may_retry {
                warn!(
                    task_id = %task_id,
                    operation,
                    attempts,
                    error = %failure,
                    "backend call failed"
                );
                return Err(failure.into_effect_error(task_id, attempts));
            }

            let delay = self
                .policy
                .backoff_for(attempts, failure.suggested_delay());
            warn!(
                task_id = %task_id,
                operation,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "retrying backend call"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn lock_journal(&self) -> std::sync::MutexGuard<'_, SimulationJournal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_preconditions(mutation: &StatusMutation) -> Result<(), EffectError> {
    if mutation.from().can_transition_to(mutation.to()) {
        return Ok(());
    }
    Err(EffectError::InvalidMutation {
        mutation_id: mutation.mutation_id(),
        task_id: mutation.task_id().clone(),
        from: mutation.from(),
        to: mutation.to(),
    })
}
