//! Given/when steps for engine connection scenarios.

use std::sync::Arc;

use mockable::MockEnv;
use rstest_bdd_macros::{given, when};
use workcell::engine::{ConnectionOverrides, ConnectionResolver, EngineEnvironment};

use super::StepResult;
use super::state::{EngineConnectionState, ResolutionOutcome};

fn set_env_var(
    engine_connection_state: &EngineConnectionState,
    key: &str,
    value: &str,
) -> StepResult<()> {
    let mut vars = engine_connection_state
        .env_vars
        .get()
        .ok_or_else(|| String::from("env vars should be initialised"))?;
    vars.insert(String::from(key), String::from(value));
    engine_connection_state.env_vars.set(vars);
    Ok(())
}

fn write_certificates(
    engine_connection_state: &EngineConnectionState,
    files: &[&str],
) -> StepResult<()> {
    let dir = tempfile::tempdir().map_err(|e| format!("failed to create temp dir: {e}"))?;
    for file in files {
        std::fs::write(dir.path().join(file), "-----BEGIN CERTIFICATE-----\n")
            .map_err(|e| format!("failed to write {file}: {e}"))?;
    }
    engine_connection_state.cert_dir.set(Arc::new(dir));
    Ok(())
}

#[given("no engine socket is configured")]
fn no_engine_socket_configured(engine_connection_state: &EngineConnectionState) {
    engine_connection_state.config_socket.set(None);
}

#[given("engine socket is configured as {socket}")]
fn engine_socket_configured_as(engine_connection_state: &EngineConnectionState, socket: String) {
    engine_connection_state.config_socket.set(Some(socket));
}

#[given("DOCKER_HOST is set to {value}")]
fn docker_host_is_set_to(
    engine_connection_state: &EngineConnectionState,
    value: String,
) -> StepResult<()> {
    set_env_var(engine_connection_state, "DOCKER_HOST", &value)
}

#[given("DOCKER_HOST is empty")]
fn docker_host_is_empty(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    set_env_var(engine_connection_state, "DOCKER_HOST", "")
}

#[given("DOCKER_TLS_VERIFY is set to {value}")]
fn docker_tls_verify_is_set_to(
    engine_connection_state: &EngineConnectionState,
    value: String,
) -> StepResult<()> {
    set_env_var(engine_connection_state, "DOCKER_TLS_VERIFY", &value)
}

#[given("a certificate directory containing cert.pem, key.pem and ca.pem")]
fn complete_certificate_directory(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    write_certificates(engine_connection_state, &["cert.pem", "key.pem", "ca.pem"])
}

#[given("a certificate directory containing cert.pem and key.pem")]
fn incomplete_certificate_directory(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    write_certificates(engine_connection_state, &["cert.pem", "key.pem"])
}

#[given("DOCKER_CERT_PATH points at the certificate directory")]
fn docker_cert_path_points_at_directory(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let dir = engine_connection_state
        .cert_dir
        .get()
        .ok_or_else(|| String::from("certificate directory should exist"))?;
    let path = dir
        .path()
        .to_str()
        .ok_or_else(|| String::from("temp dir should be UTF-8"))?
        .to_owned();
    set_env_var(engine_connection_state, "DOCKER_CERT_PATH", &path)
}

#[when("the connection is resolved")]
fn the_connection_is_resolved(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let vars = engine_connection_state
        .env_vars
        .get()
        .ok_or_else(|| String::from("env vars should be initialised"))?;
    let mut env = MockEnv::new();
    env.expect_string()
        .returning(move |key| vars.get(key).cloned());

    let overrides = ConnectionOverrides {
        socket: engine_connection_state.config_socket.get().flatten(),
        ..ConnectionOverrides::default()
    };
    let resolver = ConnectionResolver::new(EngineEnvironment::capture(&env));

    let outcome = match resolver.resolve(&overrides) {
        Ok(config) => ResolutionOutcome::Resolved {
            host: String::from(config.host()),
            tls_directory: config.tls().map(|tls| tls.directory().to_string()),
        },
        Err(e) => ResolutionOutcome::Failed(e.to_string()),
    };
    engine_connection_state.outcome.set(outcome);
    Ok(())
}
