//! Simulate-mode integration tests.

use std::sync::Arc;

use eyre::ensure;
use mockable::DefaultClock;
use rstest::rstest;
use taskgate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::TaskStatus,
    ports::TaskRepository,
    services::{ExecutionMode, TaskLifecycleService, UpdateDependenciesRequest},
};

use super::helpers::{Harness, TO_DONE, advance, harness, register};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simulated_walkthrough_matches_live_statuses(harness: Harness) -> eyre::Result<()> {
    let Harness {
        backend, service, ..
    } = harness;
    let a = register(&service, "A", &[]).await?;
    let b = register(&service, "B", &["A"]).await?;

    advance(&service, a.id(), &TO_DONE, ExecutionMode::Simulate).await?;
    advance(&service, b.id(), &TO_DONE[1..2], ExecutionMode::Simulate).await?;

    ensure!(service.get_task(a.id()).await?.status() == TaskStatus::Done);
    ensure!(service.get_task(b.id()).await?.status() == TaskStatus::InProgress);
    ensure!(backend.writes().is_empty());

    let journal = service.simulated_mutations();
    let receipts: Vec<&str> = journal.iter().map(|entry| entry.receipt.as_str()).collect();
    ensure!(receipts == ["sim-1", "sim-2", "sim-3", "sim-4", "sim-5", "sim-6"]);
    let cascade = journal
        .get(4)
        .ok_or_else(|| eyre::eyre!("missing cascade entry"))?;
    ensure!(cascade.mutation.task_id() == b.id());
    ensure!(cascade.mutation.from() == TaskStatus::Blocked);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simulated_task_revision_chains_placeholders(harness: Harness) -> eyre::Result<()> {
    let service = harness.service;
    let a = register(&service, "A", &[]).await?;

    let first = service
        .transition(a.id(), TaskStatus::Ready, ExecutionMode::Simulate)
        .await?;
    let second = service
        .transition(a.id(), TaskStatus::InProgress, ExecutionMode::Simulate)
        .await?;

    ensure!(first.task().revision().map(|receipt| receipt.as_str()) == Some("sim-1"));
    ensure!(second.task().revision().map(|receipt| receipt.as_str()) == Some("sim-2"));

    let cleared = service.clear_simulation();
    ensure!(cleared.len() == 2);
    let third = service
        .transition(a.id(), TaskStatus::Review, ExecutionMode::Simulate)
        .await?;
    ensure!(third.ack().receipt().as_str() == "sim-1");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dry_run_on_snapshot_never_touches_live_state(harness: Harness) -> eyre::Result<()> {
    let Harness {
        backend,
        repository,
        service,
    } = harness;
    register(&service, "A", &[]).await?;
    let b = register(&service, "B", &[]).await?;
    advance(&service, b.id(), &TO_DONE[..1], ExecutionMode::Live).await?;
    let live_writes = backend.writes().len();

    let dry_run = TaskLifecycleService::new(
        Arc::new(InMemoryTaskRepository::with_tasks(repository.snapshot().await?)),
        Arc::clone(&backend),
        Arc::new(DefaultClock),
    );
    let blocked = dry_run
        .update_dependencies(
            UpdateDependenciesRequest::new(b.id().clone(), ["A"])
                .with_mode(ExecutionMode::Simulate),
        )
        .await?;

    ensure!(blocked.status() == TaskStatus::Blocked);
    ensure!(service.get_task(b.id()).await?.status() == TaskStatus::Ready);
    ensure!(service.get_task(b.id()).await?.dependencies().is_empty());
    ensure!(backend.writes().len() == live_writes);
    ensure!(service.simulated_mutations().is_empty());
    ensure!(dry_run.simulated_mutations().len() == 1);
    Ok(())
}
