//! Given/when steps for container lifecycle scenarios.

use rstest_bdd_macros::{given, when};
use workcell::api::{self, CommandOutcome, RunParams};
use workcell::engine::{Cancellation, ImageReference, LaunchRequest};

use super::StepResult;
use super::engine::{EngineScript, MockEngine, scripted_engine};
use super::state::{ContainerPresence, LifecycleResult, LifecycleState};

const CONTAINER_ID: &str = "worker-1";

fn engine_for(lifecycle_state: &LifecycleState) -> StepResult<MockEngine> {
    Ok(scripted_engine(EngineScript {
        output_text: lifecycle_state.output_text.get().unwrap_or_default(),
        exit_code: lifecycle_state.exit_code.get().unwrap_or(0),
        create_fails: lifecycle_state.create_fails.get().unwrap_or(false),
        exits_before_attach: lifecycle_state.exits_before_attach.get().unwrap_or(false),
        presence: lifecycle_state
            .presence
            .get()
            .unwrap_or(ContainerPresence::Running),
        calls: lifecycle_state
            .calls
            .get()
            .ok_or_else(|| String::from("call recorder should be initialised"))?,
    }))
}

fn store_result(lifecycle_state: &LifecycleState, result: workcell::error::Result<CommandOutcome>) {
    lifecycle_state.result.set(match result {
        Ok(outcome) => LifecycleResult::Ok(outcome),
        Err(e) => LifecycleResult::Err(e.to_string()),
    });
}

fn runtime() -> StepResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))
}

#[given("a mock container engine")]
fn given_mock_engine(lifecycle_state: &LifecycleState) {
    // Fixture defaults describe a healthy engine.
    let _ = lifecycle_state;
}

#[given("the container prints {text}")]
fn given_container_prints(lifecycle_state: &LifecycleState, text: String) {
    lifecycle_state.output_text.set(format!("{text}\n"));
}

#[given("the container exits with code {code}")]
fn given_container_exit_code(lifecycle_state: &LifecycleState, code: i64) {
    lifecycle_state.exit_code.set(code);
}

#[given("container creation fails")]
fn given_creation_fails(lifecycle_state: &LifecycleState) {
    lifecycle_state.create_fails.set(true);
}

#[given("the container exits before its output is attached")]
fn given_exits_before_attach(lifecycle_state: &LifecycleState) {
    lifecycle_state.exits_before_attach.set(true);
}

#[given("the container has already exited")]
fn given_container_exited(lifecycle_state: &LifecycleState) {
    lifecycle_state.presence.set(ContainerPresence::Exited);
}

#[given("the container does not exist")]
fn given_container_missing(lifecycle_state: &LifecycleState) {
    lifecycle_state.presence.set(ContainerPresence::Missing);
}

#[when("{image} is run with command {command}")]
fn when_image_is_run(
    lifecycle_state: &LifecycleState,
    image: String,
    command: String,
) -> StepResult<()> {
    let engine = engine_for(lifecycle_state)?;
    let reference =
        ImageReference::parse(&image).map_err(|e| format!("image should parse: {e}"))?;
    let request = LaunchRequest::new(
        reference,
        command.split_whitespace().map(String::from).collect(),
    );
    let mut output = Vec::new();

    let result = runtime()?.block_on(api::run_container_async(
        &engine,
        RunParams {
            request,
            pull: true,
            stdin: None::<&mut &[u8]>,
            output: &mut output,
            cancellation: Cancellation::default(),
        },
    ));

    store_result(lifecycle_state, result);
    lifecycle_state.collected.set(output);
    Ok(())
}

#[when("the container is killed")]
fn when_container_killed(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let engine = engine_for(lifecycle_state)?;
    let rt = runtime()?;
    store_result(
        lifecycle_state,
        api::kill_container(rt.handle(), &engine, CONTAINER_ID),
    );
    Ok(())
}

#[when("the container is stopped")]
fn when_container_stopped(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let engine = engine_for(lifecycle_state)?;
    let rt = runtime()?;
    store_result(
        lifecycle_state,
        api::stop_container(rt.handle(), &engine, CONTAINER_ID),
    );
    Ok(())
}
