//! Port for the external issue-tracking backend.
//!
//! The core consumes exactly two operations: reading a task's snapshot and
//! writing a new status. The backend owns titles and bodies; the core owns
//! transition legality.

use crate::task::domain::{ExternalRef, MutationId, Receipt, TaskStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for backend operations.
pub type TaskBackendResult<T> = Result<T, TaskBackendError>;

/// Backend view of a task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Handle of the record.
    pub external_ref: ExternalRef,
    /// Display title.
    pub title: String,
    /// Free-text body.
    pub body: Option<String>,
    /// Status the backend currently stores, when it tracks one.
    pub status: Option<TaskStatus>,
}

/// Status write sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusWrite {
    /// Idempotency key; a backend that honours it applies each id once.
    pub mutation_id: MutationId,
    /// Status to store.
    pub status: TaskStatus,
}

/// Backend acknowledgement of a status write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAck {
    /// Identifier the backend allocated for the write.
    pub receipt: Receipt,
}

/// External backend contract.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Reads the backend's record for `external_ref`.
    async fn fetch_task(&self, external_ref: &ExternalRef) -> TaskBackendResult<TaskSnapshot>;

    /// Stores a new status for `external_ref`.
    async fn write_status(
        &self,
        external_ref: &ExternalRef,
        write: &StatusWrite,
    ) -> TaskBackendResult<BackendAck>;

    /// Returns `true` when repeated writes with the same mutation id are
    /// applied at most once. Only such backends are retried after a
    /// transient failure.
    fn idempotent_writes(&self) -> bool {
        false
    }
}

/// Errors returned by backend adapters.
#[derive(Debug, Clone, Error)]
pub enum TaskBackendError {
    /// The backend has no record for the reference.
    #[error("backend record not found: {0}")]
    NotFound(ExternalRef),

    /// The backend refused the write.
    #[error("backend rejected write to {external_ref}: {reason}")]
    Rejected {
        /// Record the write targeted.
        external_ref: ExternalRef,
        /// Reason reported by the backend.
        reason: String,
    },

    /// The reference no longer points at a live record.
    #[error("stale backend reference: {0}")]
    StaleReference(ExternalRef),

    /// The backend asked the caller to slow down.
    #[error("backend rate limited the request")]
    RateLimited {
        /// Delay suggested by the backend, if any.
        retry_after: Option<Duration>,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Network or client failure below the backend protocol. The outcome
    /// of a write is unknown, so it is retried like `Unavailable`.
    #[error("backend transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskBackendError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Returns `true` for failures worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable(_) | Self::Transport(_)
        )
    }
}
