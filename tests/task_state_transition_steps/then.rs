//! Then steps for task state transition BDD scenarios.

use super::world::{TaskTransitionWorld, run_async, task_id};
use rstest_bdd_macros::then;
use taskgate::task::{
    domain::{TaskStatus, TransitionError},
    services::TaskLifecycleError,
};

#[then(r#"task "{id}" has status "{state}""#)]
fn task_has_status(
    world: &TaskTransitionWorld,
    id: String,
    state: String,
) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let task = run_async(world.service.get_task(&task_id(&id)?))
        .map_err(|err| eyre::eyre!("lookup failed: {err}"))?;

    if task.status() != expected {
        return Err(eyre::eyre!(
            "expected task {id} to be {expected}, found {}",
            task.status()
        ));
    }
    Ok(())
}

#[then(r#"the transition fails with unmet dependency "{dependency}""#)]
fn transition_fails_with_unmet_dependency(
    world: &TaskTransitionWorld,
    dependency: String,
) -> Result<(), eyre::Report> {
    let result = world.last_result()?;
    let expected = task_id(&dependency)?;

    match result {
        Err(TaskLifecycleError::Transition(TransitionError::DependencyUnmet { unmet, .. }))
            if unmet.contains(&expected) =>
        {
            Ok(())
        }
        other => Err(eyre::eyre!(
            "expected DependencyUnmet naming {dependency}, got {other:?}"
        )),
    }
}

#[then(r#"the transition fails because task "{active}" is active"#)]
fn transition_fails_with_activity_conflict(
    world: &TaskTransitionWorld,
    active: String,
) -> Result<(), eyre::Report> {
    let result = world.last_result()?;
    let expected = task_id(&active)?;

    match result {
        Err(TaskLifecycleError::Transition(TransitionError::ActivityConflict {
            active: holder,
            ..
        })) if *holder == expected => Ok(()),
        other => Err(eyre::eyre!(
            "expected ActivityConflict naming {active}, got {other:?}"
        )),
    }
}

#[then("the transition fails with an invalid edge error")]
fn transition_fails_with_invalid_edge(world: &TaskTransitionWorld) -> Result<(), eyre::Report> {
    let result = world.last_result()?;

    if !matches!(
        result,
        Err(TaskLifecycleError::Transition(TransitionError::InvalidEdge { .. }))
    ) {
        return Err(eyre::eyre!("expected InvalidEdge error, got {result:?}"));
    }
    Ok(())
}

#[then("the transition fails with an invalid state error")]
fn transition_fails_with_invalid_state_error(
    world: &TaskTransitionWorld,
) -> Result<(), eyre::Report> {
    let result = world.last_result()?;

    if !matches!(result, Err(TaskLifecycleError::InvalidState(_))) {
        return Err(eyre::eyre!("expected InvalidState error, got {result:?}"));
    }
    Ok(())
}

#[then(r#"the recorded receipt is "{receipt}""#)]
fn recorded_receipt_is(world: &TaskTransitionWorld, receipt: String) -> Result<(), eyre::Report> {
    let outcome = world
        .last_result()?
        .as_ref()
        .map_err(|err| eyre::eyre!("unexpected transition failure: {err}"))?;

    if outcome.ack().receipt().as_str() != receipt {
        return Err(eyre::eyre!(
            "expected receipt {receipt}, found {}",
            outcome.ack().receipt()
        ));
    }
    Ok(())
}

#[then("the backend received no writes")]
fn backend_received_no_writes(world: &TaskTransitionWorld) -> Result<(), eyre::Report> {
    let writes = world.backend.writes();
    if !writes.is_empty() {
        return Err(eyre::eyre!("expected no backend writes, found {}", writes.len()));
    }
    Ok(())
}
