//! Mock container engine configured from scenario state.

use std::sync::{Arc, Mutex};

use bollard::container::{AttachContainerResults, LogOutput};
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerWaitResponse, CreateImageInfo,
};
use bollard::query_parameters::{
    AttachContainerOptions, CreateContainerOptions, CreateImageOptions, KillContainerOptions,
    LogsOptions, RemoveContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use futures_util::stream;
use mockall::mock;
use workcell::engine::{
    AttachContainerFuture, ContainerAttachClient, ContainerLifecycleClient, CreateContainerFuture,
    CreateImageStream, EngineCallFuture, ImagePuller, InspectContainerFuture, LogStream,
    WaitContainerFuture,
};

use super::state::{ContainerPresence, EngineCalls};

mock! {
    #[derive(Debug)]
    pub(crate) Engine {}

    impl ImagePuller for Engine {
        fn create_image(&self, options: CreateImageOptions) -> CreateImageStream<'_>;
    }

    impl ContainerLifecycleClient for Engine {
        fn create_container(
            &self,
            options: Option<CreateContainerOptions>,
            config: ContainerCreateBody,
        ) -> CreateContainerFuture<'_>;
        fn start_container(&self, container_id: &str) -> EngineCallFuture<'_>;
        fn stop_container(&self, container_id: &str, options: StopContainerOptions) -> EngineCallFuture<'_>;
        fn kill_container(&self, container_id: &str, options: KillContainerOptions) -> EngineCallFuture<'_>;
        fn remove_container(&self, container_id: &str, options: RemoveContainerOptions) -> EngineCallFuture<'_>;
        fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_>;
        fn wait_container(&self, container_id: &str, options: WaitContainerOptions) -> WaitContainerFuture<'_>;
    }

    impl ContainerAttachClient for Engine {
        fn attach_container(&self, container_id: &str, options: AttachContainerOptions) -> AttachContainerFuture<'_>;
        fn container_logs(&self, container_id: &str, options: LogsOptions) -> LogStream<'_>;
    }
}

/// Behaviour the mock engine should exhibit.
pub(crate) struct EngineScript {
    pub(crate) output_text: String,
    pub(crate) exit_code: i64,
    pub(crate) create_fails: bool,
    pub(crate) exits_before_attach: bool,
    pub(crate) presence: ContainerPresence,
    pub(crate) calls: Arc<Mutex<EngineCalls>>,
}

fn record(calls: &Arc<Mutex<EngineCalls>>, update: impl FnOnce(&mut EngineCalls)) {
    if let Ok(mut guard) = calls.lock() {
        update(&mut guard);
    }
}

fn server_error(status_code: u16, message: &str) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code,
        message: String::from(message),
    }
}

/// Status code the engine returns for stop and kill in each presence.
const fn terminal_status(presence: ContainerPresence, stopping: bool) -> Option<u16> {
    match presence {
        ContainerPresence::Running => None,
        ContainerPresence::Exited if stopping => Some(304),
        ContainerPresence::Exited => Some(409),
        ContainerPresence::Missing => Some(404),
    }
}

pub(crate) fn scripted_engine(script: EngineScript) -> MockEngine {
    let mut engine = MockEngine::new();
    configure_pull(&mut engine, &script);
    configure_create_and_start(&mut engine, &script);
    configure_stop_and_kill(&mut engine, &script);
    configure_streams(&mut engine, &script);
    engine
}

fn configure_pull(engine: &mut MockEngine, script: &EngineScript) {
    let calls = Arc::clone(&script.calls);
    engine.expect_create_image().returning(move |options| {
        let reference = format!(
            "{}:{}",
            options.from_image.unwrap_or_default(),
            options.tag.unwrap_or_default()
        );
        record(&calls, |recorded| recorded.pulled.push(reference));
        Box::pin(stream::iter(vec![Ok(CreateImageInfo {
            status: Some(String::from("Download complete")),
            ..CreateImageInfo::default()
        })]))
    });
}

fn configure_create_and_start(engine: &mut MockEngine, script: &EngineScript) {
    let create_calls = Arc::clone(&script.calls);
    let create_fails = script.create_fails;
    engine
        .expect_create_container()
        .returning(move |_, body| {
            record(&create_calls, |recorded| {
                recorded
                    .created_images
                    .push(body.image.clone().unwrap_or_default());
            });
            Box::pin(async move {
                if create_fails {
                    Err(server_error(500, "no space left on device"))
                } else {
                    Ok(ContainerCreateResponse {
                        id: String::from("worker-1"),
                        warnings: vec![],
                    })
                }
            })
        });

    let start_calls = Arc::clone(&script.calls);
    engine.expect_start_container().returning(move |container_id| {
        let id = String::from(container_id);
        record(&start_calls, |recorded| recorded.started.push(id));
        Box::pin(async { Ok(()) })
    });
}

fn configure_stop_and_kill(engine: &mut MockEngine, script: &EngineScript) {
    let stop_calls = Arc::clone(&script.calls);
    let stop_status = terminal_status(script.presence, true);
    engine.expect_stop_container().returning(move |_, options| {
        record(&stop_calls, |recorded| {
            recorded.stop_grace_periods.push(options.t);
        });
        Box::pin(async move {
            stop_status.map_or(Ok(()), |status| Err(server_error(status, "container state")))
        })
    });

    let kill_status = terminal_status(script.presence, false);
    engine.expect_kill_container().returning(move |_, _| {
        Box::pin(async move {
            kill_status.map_or(Ok(()), |status| Err(server_error(status, "container state")))
        })
    });
}

fn output_frames(output: &[u8]) -> Vec<Result<LogOutput, BollardError>> {
    if output.is_empty() {
        vec![]
    } else {
        vec![Ok(LogOutput::StdOut {
            message: output.to_vec().into(),
        })]
    }
}

fn configure_streams(engine: &mut MockEngine, script: &EngineScript) {
    let attach_output = script.output_text.clone().into_bytes();
    let exits_before_attach = script.exits_before_attach;
    engine.expect_attach_container().returning(move |_, _| {
        let frames = output_frames(&attach_output);
        Box::pin(async move {
            if exits_before_attach {
                Err(server_error(409, "container worker-1 is not running"))
            } else {
                Ok(AttachContainerResults {
                    output: Box::pin(stream::iter(frames)),
                    input: Box::pin(tokio::io::sink()),
                })
            }
        })
    });

    let recorded_output = script.output_text.clone().into_bytes();
    engine
        .expect_container_logs()
        .returning(move |_, _| Box::pin(stream::iter(output_frames(&recorded_output))));

    let exit_code = script.exit_code;
    engine.expect_wait_container().returning(move |_, _| {
        Box::pin(async move {
            Some(Ok(ContainerWaitResponse {
                status_code: exit_code,
                error: None,
            }))
        })
    });
}
