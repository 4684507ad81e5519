//! Repository contract tests for the in-memory task store.

use chrono::Utc;
use eyre::{bail, ensure};
use rstest::{fixture, rstest};
use taskgate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{ExternalRef, PersistedTaskData, Task, TaskFilter, TaskStatus, TaskStore},
    ports::{TaskRepository, TaskRepositoryError},
};

use super::helpers::id;

fn record(raw: &str, status: TaskStatus, dependencies: &[&str]) -> Task {
    let now = Utc::now();
    let task_id = id(raw);
    Task::from_persisted(PersistedTaskData {
        external_ref: ExternalRef::for_task(&task_id),
        id: task_id,
        title: format!("Task {raw}"),
        body: None,
        status,
        dependencies: dependencies.iter().map(|dep| id(dep)).collect(),
        revision: None,
        created_at: now,
        updated_at: now,
    })
}

#[fixture]
fn repo() -> InMemoryTaskRepository {
    InMemoryTaskRepository::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_then_find_returns_same_task(repo: InMemoryTaskRepository) -> eyre::Result<()> {
    let task = record("A", TaskStatus::Todo, &[]);
    repo.store(&task).await?;

    ensure!(repo.find_by_id(task.id()).await? == Some(task));
    ensure!(repo.find_by_id(&id("missing")).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_rejects_duplicate_id(repo: InMemoryTaskRepository) -> eyre::Result<()> {
    repo.store(&record("A", TaskStatus::Todo, &[])).await?;

    match repo.store(&record("A", TaskStatus::Ready, &[])).await {
        Err(TaskRepositoryError::DuplicateTask(duplicate)) => ensure!(duplicate == id("A")),
        other => bail!("expected DuplicateTask, got {other:?}"),
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_requires_existing_task(repo: InMemoryTaskRepository) -> eyre::Result<()> {
    let result = repo.update(&record("A", TaskStatus::Ready, &[])).await;
    ensure!(matches!(result, Err(TaskRepositoryError::NotFound(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn seeded_repository_is_independent_of_source() -> eyre::Result<()> {
    let source = TaskStore::from_tasks([
        record("A", TaskStatus::Done, &[]),
        record("B", TaskStatus::Ready, &["A"]),
    ]);
    let repo = InMemoryTaskRepository::with_tasks(source.clone());

    repo.update(&record("B", TaskStatus::InProgress, &["A"])).await?;

    ensure!(source.get(&id("B")).map(Task::status) == Some(TaskStatus::Ready));
    let listed = repo
        .list(&TaskFilter::any().depending_on(id("A")))
        .await?;
    ensure!(listed.iter().map(Task::status).eq([TaskStatus::InProgress]));
    ensure!(repo.snapshot().await?.len() == 2);
    Ok(())
}
