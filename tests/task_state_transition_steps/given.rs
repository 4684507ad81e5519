//! Given steps for task state transition BDD scenarios.

use super::world::{TaskTransitionWorld, run_async, task_id};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use taskgate::task::services::{RegisterTaskRequest, TransitionTaskRequest};

#[given(r#"a task "{id}" titled "{title}""#)]
fn task_titled(
    world: &mut TaskTransitionWorld,
    id: String,
    title: String,
) -> Result<(), eyre::Report> {
    run_async(world.service.register_task(RegisterTaskRequest::new(id, title)))
        .wrap_err("register task for transition scenario")?;
    Ok(())
}

#[given(r#"a task "{id}" that depends on "{dependency}""#)]
fn task_depending_on(
    world: &mut TaskTransitionWorld,
    id: String,
    dependency: String,
) -> Result<(), eyre::Report> {
    let request = RegisterTaskRequest::new(id.clone(), format!("Follow-up {id}"))
        .with_dependencies([dependency]);
    run_async(world.service.register_task(request))
        .wrap_err("register dependent task for transition scenario")?;
    Ok(())
}

#[given(r#"task "{id}" has been transitioned to "{target_state}""#)]
fn task_has_been_transitioned(
    world: &mut TaskTransitionWorld,
    id: String,
    target_state: String,
) -> Result<(), eyre::Report> {
    let request = TransitionTaskRequest::new(task_id(&id)?, target_state);
    run_async(world.service.request_transition(request))
        .wrap_err("transition task in scenario setup")?;
    Ok(())
}
