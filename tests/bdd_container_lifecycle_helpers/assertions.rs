//! Assertion steps for container lifecycle scenarios.

use rstest_bdd_macros::then;
use workcell::api::CommandOutcome;

use super::StepResult;
use super::state::{EngineCalls, LifecycleResult, LifecycleState};

fn result(lifecycle_state: &LifecycleState) -> StepResult<LifecycleResult> {
    lifecycle_state
        .result
        .get()
        .ok_or_else(|| String::from("result should be set"))
}

fn with_calls<T>(
    lifecycle_state: &LifecycleState,
    inspect: impl FnOnce(&EngineCalls) -> T,
) -> StepResult<T> {
    let calls = lifecycle_state
        .calls
        .get()
        .ok_or_else(|| String::from("call recorder should be initialised"))?;
    let guard = calls.lock().map_err(|_| String::from("call recorder poisoned"))?;
    Ok(inspect(&guard))
}

fn error_message(lifecycle_state: &LifecycleState) -> StepResult<String> {
    match result(lifecycle_state)? {
        LifecycleResult::Err(message) => Ok(message),
        LifecycleResult::Ok(outcome) => Err(format!("expected an error, got {outcome:?}")),
    }
}

fn expect_success(lifecycle_state: &LifecycleState) -> StepResult<()> {
    match result(lifecycle_state)? {
        LifecycleResult::Ok(CommandOutcome::Success) => Ok(()),
        other => Err(format!("expected Success, got {other:?}")),
    }
}

#[then("the outcome is success")]
fn outcome_is_success(lifecycle_state: &LifecycleState) -> StepResult<()> {
    expect_success(lifecycle_state)
}

#[then("the operation succeeds")]
fn operation_succeeds(lifecycle_state: &LifecycleState) -> StepResult<()> {
    expect_success(lifecycle_state)
}

#[then("the outcome is command exit with code {expected_code}")]
fn outcome_is_command_exit(lifecycle_state: &LifecycleState, expected_code: i64) -> StepResult<()> {
    match result(lifecycle_state)? {
        LifecycleResult::Ok(CommandOutcome::CommandExit { code }) if code == expected_code => Ok(()),
        other => Err(format!(
            "expected CommandExit {{ code: {expected_code} }}, got {other:?}"
        )),
    }
}

#[then("the collected output is {text}")]
fn collected_output_is(lifecycle_state: &LifecycleState, text: String) -> StepResult<()> {
    let collected = lifecycle_state.collected.get().unwrap_or_default();
    let expected = format!("{text}\n");
    if collected == expected.as_bytes() {
        Ok(())
    } else {
        Err(format!(
            "expected output {expected:?}, got {:?}",
            String::from_utf8_lossy(&collected)
        ))
    }
}

#[then("the pulled image was {reference}")]
fn pulled_image_was(lifecycle_state: &LifecycleState, reference: String) -> StepResult<()> {
    let (pulled, created) = with_calls(lifecycle_state, |calls| {
        (calls.pulled.clone(), calls.created_images.clone())
    })?;
    if pulled == [reference.clone()] && created == [reference.clone()] {
        Ok(())
    } else {
        Err(format!(
            "expected pull and create of {reference}, got pulls {pulled:?} and creates {created:?}"
        ))
    }
}

#[then("the run fails with a create error")]
fn run_fails_with_create_error(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let message = error_message(lifecycle_state)?;
    if message.contains("failed to create container") {
        Ok(())
    } else {
        Err(format!("expected create failure, got: {message}"))
    }
}

#[then("no container was started")]
fn no_container_was_started(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let started = with_calls(lifecycle_state, |calls| calls.started.clone())?;
    if started.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no start request, got {started:?}"))
    }
}

#[then("the operation fails with not found")]
fn operation_fails_with_not_found(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let message = error_message(lifecycle_state)?;
    if message.contains("not found") {
        Ok(())
    } else {
        Err(format!("expected not found, got: {message}"))
    }
}

#[then("stop was requested with a grace period of {seconds} seconds")]
fn stop_grace_period(lifecycle_state: &LifecycleState, seconds: i32) -> StepResult<()> {
    let periods = with_calls(lifecycle_state, |calls| calls.stop_grace_periods.clone())?;
    if periods == [Some(seconds)] {
        Ok(())
    } else {
        Err(format!("expected one stop with t={seconds}, got {periods:?}"))
    }
}
