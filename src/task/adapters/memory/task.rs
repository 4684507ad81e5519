//! In-memory task repository.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{Task, TaskFilter, TaskId, TaskStore},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<TaskStore>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository seeded with an existing snapshot.
    ///
    /// Used to run a simulated session against a copy of a live store.
    #[must_use]
    pub fn with_tasks(store: TaskStore) -> Self {
        Self {
            state: Arc::new(RwLock::new(store)),
        }
    }
}

fn poisoned(err: &impl std::fmt::Display) -> TaskRepositoryError {
    TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(|err| poisoned(&err))?;
        if state.contains(task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id().clone()));
        }
        state.put(task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(|err| poisoned(&err))?;
        if !state.contains(task.id()) {
            return Err(TaskRepositoryError::NotFound(task.id().clone()));
        }
        state.put(task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        Ok(state.get(id).cloned())
    }

    async fn list(&self, filter: &TaskFilter) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        Ok(state.select(filter))
    }

    async fn snapshot(&self) -> TaskRepositoryResult<TaskStore> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        Ok(state.clone())
    }
}
