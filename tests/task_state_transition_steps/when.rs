//! When steps for task state transition BDD scenarios.

use super::world::{TaskTransitionWorld, run_async, task_id};
use rstest_bdd_macros::when;
use taskgate::task::services::TransitionTaskRequest;

#[when(r#"task "{id}" is transitioned to "{target_state}""#)]
fn transition_task(
    world: &mut TaskTransitionWorld,
    id: String,
    target_state: String,
) -> Result<(), eyre::Report> {
    let request = TransitionTaskRequest::new(task_id(&id)?, target_state);
    world.last_transition_result = Some(run_async(world.service.request_transition(request)));
    Ok(())
}

#[when(r#"task "{id}" is simulated to "{target_state}""#)]
fn simulate_task(
    world: &mut TaskTransitionWorld,
    id: String,
    target_state: String,
) -> Result<(), eyre::Report> {
    let request = TransitionTaskRequest::new(task_id(&id)?, target_state).simulated();
    world.last_transition_result = Some(run_async(world.service.request_transition(request)));
    Ok(())
}
