//! Scenario state for engine connection behavioural tests.

use std::collections::HashMap;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tempfile::TempDir;

/// Outcome of resolving the connection configuration.
#[derive(Debug, Clone)]
pub(crate) enum ResolutionOutcome {
    /// Resolution produced an endpoint and optional TLS directory.
    Resolved {
        host: String,
        tls_directory: Option<String>,
    },
    /// Resolution failed with the rendered error.
    Failed(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct EngineConnectionState {
    pub(crate) env_vars: Slot<HashMap<String, String>>,
    pub(crate) config_socket: Slot<Option<String>>,
    pub(crate) cert_dir: Slot<Arc<TempDir>>,
    pub(crate) outcome: Slot<ResolutionOutcome>,
}

#[fixture]
pub(crate) fn engine_connection_state() -> EngineConnectionState {
    let state = EngineConnectionState::default();
    state.env_vars.set(HashMap::new());
    state.config_socket.set(None);
    state
}
