//! In-memory stand-in for the external issue-tracking backend.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::task::{
    domain::{ExternalRef, MutationId, Receipt},
    ports::{
        BackendAck, StatusWrite, TaskBackend, TaskBackendError, TaskBackendResult, TaskSnapshot,
    },
};

/// In-memory backend adapter.
///
/// Records every status write, allocates sequential receipts (`rev-1`,
/// `rev-2`, ...), and lets tests script failures and latency. Unknown
/// references are provisioned on first write unless the backend is built
/// with [`InMemoryTaskBackend::strict`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskBackend {
    state: Arc<RwLock<InMemoryBackendState>>,
}

#[derive(Debug, Default)]
struct InMemoryBackendState {
    records: HashMap<ExternalRef, TaskSnapshot>,
    writes: Vec<(ExternalRef, StatusWrite)>,
    applied: HashMap<MutationId, Receipt>,
    scripted_failures: VecDeque<TaskBackendError>,
    targeted_failures: HashMap<ExternalRef, VecDeque<TaskBackendError>>,
    latency: Option<Duration>,
    idempotent: bool,
    strict: bool,
    next_receipt: u64,
}

impl InMemoryTaskBackend {
    /// Creates a permissive backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that rejects writes to unseeded references.
    #[must_use]
    pub fn strict() -> Self {
        let backend = Self::default();
        backend.with_state(|state| state.strict = true);
        backend
    }

    /// Declares whether writes are deduplicated by mutation id.
    #[must_use]
    pub fn with_idempotent_writes(self, idempotent: bool) -> Self {
        self.with_state(|state| state.idempotent = idempotent);
        self
    }

    /// Delays every call by `latency` before it is served.
    pub fn set_latency(&self, latency: Duration) {
        self.with_state(|state| state.latency = Some(latency));
    }

    /// Seeds or replaces a backend record.
    pub fn insert_record(&self, snapshot: TaskSnapshot) {
        self.with_state(|state| {
            state
                .records
                .insert(snapshot.external_ref.clone(), snapshot);
        });
    }

    /// Queues an error returned by the next status write instead of
    /// applying it. Queued errors are consumed in order.
    pub fn fail_next_write(&self, error: TaskBackendError) {
        self.with_state(|state| state.scripted_failures.push_back(error));
    }

    /// Queues an error returned by the next status write to `external_ref`
    /// only. Targeted errors take precedence over [`Self::fail_next_write`].
    pub fn fail_next_write_to(&self, external_ref: ExternalRef, error: TaskBackendError) {
        self.with_state(|state| {
            state
                .targeted_failures
                .entry(external_ref)
                .or_default()
                .push_back(error);
        });
    }

    /// Returns every applied write, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<(ExternalRef, StatusWrite)> {
        self.read_state(|state| state.writes.clone())
    }

    /// Returns the stored record for `external_ref`, if any.
    #[must_use]
    pub fn record(&self, external_ref: &ExternalRef) -> Option<TaskSnapshot> {
        self.read_state(|state| state.records.get(external_ref).cloned())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut InMemoryBackendState) -> T) -> T {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }

    fn read_state<T>(&self, f: impl FnOnce(&InMemoryBackendState) -> T) -> T {
        let state = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&state)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.read_state(|state| state.latency) {
            tokio::time::sleep(latency).await;
        }
    }
}

impl InMemoryBackendState {
    fn apply_write(
        &mut self,
        external_ref: &ExternalRef,
        write: &StatusWrite,
    ) -> TaskBackendResult<BackendAck> {
        if self.idempotent {
            if let Some(receipt) = self.applied.get(&write.mutation_id) {
                return Ok(BackendAck {
                    receipt: receipt.clone(),
                });
            }
        }
        if let Some(error) = self
            .targeted_failures
            .get_mut(external_ref)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(error) = self.scripted_failures.pop_front() {
            return Err(error);
        }

        if !self.records.contains_key(external_ref) {
            if self.strict {
                return Err(TaskBackendError::NotFound(external_ref.clone()));
            }
            self.records.insert(
                external_ref.clone(),
                TaskSnapshot {
                    external_ref: external_ref.clone(),
                    title: external_ref.to_string(),
                    body: None,
                    status: None,
                },
            );
        }
        if let Some(record) = self.records.get_mut(external_ref) {
            record.status = Some(write.status);
        }

        self.next_receipt = self.next_receipt.saturating_add(1);
        let receipt = Receipt::new(format!("rev-{}", self.next_receipt));
        self.applied.insert(write.mutation_id, receipt.clone());
        self.writes.push((external_ref.clone(), *write));
        Ok(BackendAck { receipt })
    }
}

#[async_trait]
impl TaskBackend for InMemoryTaskBackend {
    async fn fetch_task(&self, external_ref: &ExternalRef) -> TaskBackendResult<TaskSnapshot> {
        self.simulate_latency().await;
        self.read_state(|state| state.records.get(external_ref).cloned())
            .ok_or_else(|| TaskBackendError::NotFound(external_ref.clone()))
    }

    async fn write_status(
        &self,
        external_ref: &ExternalRef,
        write: &StatusWrite,
    ) -> TaskBackendResult<BackendAck> {
        self.simulate_latency().await;
        self.with_state(|state| state.apply_write(external_ref, write))
    }

    fn idempotent_writes(&self) -> bool {
        self.read_state(|state| state.idempotent)
    }
}
