//! Scenario state for container lifecycle behavioural tests.

use std::sync::{Arc, Mutex};

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use workcell::api::CommandOutcome;

/// State of the target container as the mock engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerPresence {
    Running,
    Exited,
    Missing,
}

/// Requests observed by the mock engine.
#[derive(Debug, Default)]
pub(crate) struct EngineCalls {
    pub(crate) pulled: Vec<String>,
    pub(crate) created_images: Vec<String>,
    pub(crate) started: Vec<String>,
    pub(crate) stop_grace_periods: Vec<Option<i32>>,
}

/// High-level outcome of the step under test.
#[derive(Debug, Clone)]
pub(crate) enum LifecycleResult {
    Ok(CommandOutcome),
    Err(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct LifecycleState {
    pub(crate) output_text: Slot<String>,
    pub(crate) exit_code: Slot<i64>,
    pub(crate) create_fails: Slot<bool>,
    pub(crate) exits_before_attach: Slot<bool>,
    pub(crate) presence: Slot<ContainerPresence>,
    pub(crate) calls: Slot<Arc<Mutex<EngineCalls>>>,
    pub(crate) collected: Slot<Vec<u8>>,
    pub(crate) result: Slot<LifecycleResult>,
}

#[fixture]
pub(crate) fn lifecycle_state() -> LifecycleState {
    let state = LifecycleState::default();
    state.output_text.set(String::new());
    state.exit_code.set(0);
    state.create_fails.set(false);
    state.exits_before_attach.set(false);
    state.presence.set(ContainerPresence::Running);
    state.calls.set(Arc::new(Mutex::new(EngineCalls::default())));
    state
}
