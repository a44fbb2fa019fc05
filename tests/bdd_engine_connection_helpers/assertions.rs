//! Assertion steps for engine connection scenarios.

use rstest_bdd_macros::then;
use workcell::engine::ConnectionResolver;

use super::StepResult;
use super::state::{EngineConnectionState, ResolutionOutcome};

fn resolved(engine_connection_state: &EngineConnectionState) -> StepResult<(String, Option<String>)> {
    match engine_connection_state.outcome.get() {
        Some(ResolutionOutcome::Resolved {
            host,
            tls_directory,
        }) => Ok((host, tls_directory)),
        Some(ResolutionOutcome::Failed(message)) => {
            Err(format!("expected resolution to succeed, got: {message}"))
        }
        None => Err(String::from("resolution outcome should be set")),
    }
}

fn failure(engine_connection_state: &EngineConnectionState) -> StepResult<String> {
    match engine_connection_state.outcome.get() {
        Some(ResolutionOutcome::Failed(message)) => Ok(message),
        Some(ResolutionOutcome::Resolved { host, .. }) => {
            Err(format!("expected resolution to fail, resolved {host}"))
        }
        None => Err(String::from("resolution outcome should be set")),
    }
}

#[then("the resolved endpoint is {expected}")]
fn the_resolved_endpoint_is(
    engine_connection_state: &EngineConnectionState,
    expected: String,
) -> StepResult<()> {
    let (host, _) = resolved(engine_connection_state)?;
    if host == expected {
        Ok(())
    } else {
        Err(format!("expected endpoint '{expected}', got '{host}'"))
    }
}

#[then("the endpoint is the platform default")]
fn the_endpoint_is_the_platform_default(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let (host, _) = resolved(engine_connection_state)?;
    let default = ConnectionResolver::default_socket();
    if host == default {
        Ok(())
    } else {
        Err(format!("expected platform default '{default}', got '{host}'"))
    }
}

#[then("the connection is plain")]
fn the_connection_is_plain(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    match resolved(engine_connection_state)? {
        (_, None) => Ok(()),
        (_, Some(directory)) => Err(format!("expected no TLS, got directory {directory}")),
    }
}

#[then("the connection uses TLS from the certificate directory")]
fn the_connection_uses_tls(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let expected = engine_connection_state
        .cert_dir
        .get()
        .ok_or_else(|| String::from("certificate directory should exist"))?
        .path()
        .to_string_lossy()
        .into_owned();
    match resolved(engine_connection_state)? {
        (_, Some(directory)) if directory == expected => Ok(()),
        (_, other) => Err(format!("expected TLS from {expected}, got {other:?}")),
    }
}

#[then("resolution fails with a missing configuration error")]
fn resolution_fails_with_missing_configuration(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let message = failure(engine_connection_state)?;
    if message.contains("missing required configuration") {
        Ok(())
    } else {
        Err(format!("expected missing configuration error, got: {message}"))
    }
}

#[then("resolution fails because ca.pem is missing")]
fn resolution_fails_because_ca_is_missing(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let message = failure(engine_connection_state)?;
    if message.contains("ca.pem") {
        Ok(())
    } else {
        Err(format!("expected missing ca.pem, got: {message}"))
    }
}
