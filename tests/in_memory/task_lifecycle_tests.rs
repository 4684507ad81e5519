//! In-memory integration tests for task lifecycle operations.

use super::helpers::{Harness, TO_DONE, advance, harness, harness_with, id, register};
use eyre::ensure;
use rstest::rstest;
use taskgate::task::{
    adapters::memory::InMemoryTaskBackend,
    domain::{TaskFilter, TaskStatus},
    services::{ExecutionMode, TaskErrorKind, TransitionTaskRequest},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependency_chain_completes_in_order(harness: Harness) -> eyre::Result<()> {
    let Harness {
        backend, service, ..
    } = harness;
    let a = register(&service, "A", &[]).await?;
    let b = register(&service, "B", &["A"]).await?;
    let c = register(&service, "C", &["B"]).await?;

    advance(&service, a.id(), &TO_DONE, ExecutionMode::Live).await?;
    ensure!(service.get_task(b.id()).await?.status() == TaskStatus::Ready);
    ensure!(service.get_task(c.id()).await?.status() == TaskStatus::Blocked);

    advance(&service, b.id(), &TO_DONE[1..], ExecutionMode::Live).await?;
    ensure!(service.get_task(c.id()).await?.status() == TaskStatus::Ready);

    advance(&service, c.id(), &TO_DONE[1..], ExecutionMode::Live).await?;
    let done = service
        .list_tasks(&TaskFilter::any().with_status(TaskStatus::Done))
        .await?;
    ensure!(done.len() == 3);
    // A: 4 writes, B: cascade + 3, C: cascade + 3.
    ensure!(backend.writes().len() == 12);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_dependency_keeps_dependent_blocked(harness: Harness) -> eyre::Result<()> {
    let service = harness.service;
    let a = register(&service, "A", &[]).await?;
    let c = register(&service, "C", &[]).await?;
    let b = register(&service, "B", &["A", "C"]).await?;

    advance(&service, a.id(), &TO_DONE, ExecutionMode::Live).await?;
    ensure!(service.get_task(b.id()).await?.status() == TaskStatus::Blocked);

    advance(&service, c.id(), &TO_DONE, ExecutionMode::Live).await?;
    ensure!(service.get_task(b.id()).await?.status() == TaskStatus::Ready);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn active_slot_frees_when_holder_enters_review(harness: Harness) -> eyre::Result<()> {
    let service = harness.service;
    let a = register(&service, "A", &[]).await?;
    let d = register(&service, "D", &[]).await?;
    advance(&service, a.id(), &TO_DONE[..2], ExecutionMode::Live).await?;
    advance(&service, d.id(), &TO_DONE[..1], ExecutionMode::Live).await?;

    let blocked = service
        .request_transition(TransitionTaskRequest::new(d.id().clone(), "in-progress"))
        .await;
    ensure!(blocked.map_err(|error| error.kind()).err() == Some(TaskErrorKind::ActivityConflict));

    service.transition(a.id(), TaskStatus::Review, ExecutionMode::Live).await?;
    service.transition(d.id(), TaskStatus::InProgress, ExecutionMode::Live).await?;

    let rework = service
        .transition(a.id(), TaskStatus::InProgress, ExecutionMode::Live)
        .await;
    ensure!(rework.map_err(|error| error.kind()).err() == Some(TaskErrorKind::ActivityConflict));
    ensure!(service.active_task().await?.map(|task| task.id().clone()) == Some(id("D")));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_dependency_resolves_once_registered(harness: Harness) -> eyre::Result<()> {
    let service = harness.service;
    let b = register(&service, "B", &["A"]).await?;
    ensure!(b.status() == TaskStatus::Blocked);

    let a = register(&service, "A", &[]).await?;
    advance(&service, a.id(), &TO_DONE, ExecutionMode::Live).await?;

    ensure!(service.get_task(b.id()).await?.status() == TaskStatus::Ready);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn strict_backend_rejects_unknown_reference_without_commit() -> eyre::Result<()> {
    let Harness { service, .. } = harness_with(InMemoryTaskBackend::strict());
    let a = register(&service, "A", &[]).await?;

    let result = service.transition(a.id(), TaskStatus::Ready, ExecutionMode::Live).await;

    ensure!(result.map_err(|error| error.kind()).err() == Some(TaskErrorKind::Effect));
    ensure!(service.get_task(a.id()).await?.status() == TaskStatus::Todo);
    Ok(())
}
