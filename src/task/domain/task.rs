//! Task aggregate root.

use super::{ExternalRef, Receipt, TaskDomainError, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Validated inputs for a task entering the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    id: TaskId,
    title: String,
    body: Option<String>,
    dependencies: BTreeSet<TaskId>,
    external_ref: ExternalRef,
}

impl NewTask {
    /// Validates the title and derives the default external reference.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(id: TaskId, title: impl Into<String>) -> Result<Self, TaskDomainError> {
        let normalized_title = normalize_title(&title.into())?;
        let external_ref = ExternalRef::for_task(&id);
        Ok(Self {
            id,
            title: normalized_title,
            body: None,
            dependencies: BTreeSet::new(),
            external_ref,
        })
    }

    /// Sets the dependency set.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Overrides the backend handle.
    #[must_use]
    pub fn with_external_ref(mut self, external_ref: ExternalRef) -> Self {
        self.external_ref = external_ref;
        self
    }

    /// Sets the free-text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the declared dependencies.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }
}

/// Task aggregate root.
///
/// Status only changes through [`Task::apply_status`], which the lifecycle
/// service calls after the state machine and effect executor have both
/// accepted the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    body: Option<String>,
    status: TaskStatus,
    dependencies: BTreeSet<TaskId>,
    external_ref: ExternalRef,
    revision: Option<Receipt>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted display title.
    pub title: String,
    /// Persisted free-text body, if any.
    pub body: Option<String>,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted dependency set.
    pub dependencies: BTreeSet<TaskId>,
    /// Persisted backend handle.
    pub external_ref: ExternalRef,
    /// Receipt of the latest applied status write, if any.
    pub revision: Option<Receipt>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task in its initial status.
    #[must_use]
    pub fn register(new_task: NewTask, initial_status: TaskStatus, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: new_task.id,
            title: new_task.title,
            body: new_task.body,
            status: initial_status,
            dependencies: new_task.dependencies,
            external_ref: new_task.external_ref,
            revision: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            body: data.body,
            status: data.status,
            dependencies: data.dependencies,
            external_ref: data.external_ref,
            revision: data.revision,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> &TaskId {
        &self.id
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the free-text body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the dependency set.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }

    /// Returns the backend handle.
    #[must_use]
    pub const fn external_ref(&self) -> &ExternalRef {
        &self.external_ref
    }

    /// Returns the receipt of the latest applied status write.
    #[must_use]
    pub const fn revision(&self) -> Option<&Receipt> {
        self.revision.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records an accepted status change together with its receipt.
    pub(crate) fn apply_status(
        &mut self,
        status: TaskStatus,
        receipt: Receipt,
        clock: &impl Clock,
    ) {
        self.status = status;
        self.revision = Some(receipt);
        self.touch(clock);
    }

    /// Replaces the dependency set. Callers validate the graph first.
    pub(crate) fn replace_dependencies(
        &mut self,
        dependencies: BTreeSet<TaskId>,
        clock: &impl Clock,
    ) {
        self.dependencies = dependencies;
        self.touch(clock);
    }

    /// Adopts backend-owned display fields.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the backend title is
    /// blank; the task is left unchanged.
    pub(crate) fn refresh_metadata(
        &mut self,
        title: &str,
        body: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.title = normalize_title(title)?;
        self.body = body;
        self.touch(clock);
        Ok(())
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

fn normalize_title(title: &str) -> Result<String, TaskDomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskDomainError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}
