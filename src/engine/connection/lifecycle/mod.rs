//! Container lifecycle: create and start, stop, kill, inspect and wait.
//!
//! Every engine call goes through [`ContainerLifecycleClient`] so request
//! building and response interpretation can be unit-tested without a live
//! daemon. Operations on a container that has already reached the requested
//! state are reported as success.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, ContainerWaitResponse,
    HostConfig,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateContainerOptionsBuilder, InspectContainerOptions,
    KillContainerOptions, KillContainerOptionsBuilder, RemoveContainerOptions,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptions,
    StopContainerOptionsBuilder, WaitContainerOptions, WaitContainerOptionsBuilder,
};
use futures_util::StreamExt;
use tracing::{info, warn};

use super::error_classification::{
    STATUS_CONFLICT, STATUS_NOT_MODIFIED, classify_request_error, engine_status_code,
};
use super::{Cancellation, EngineConnector, ImageReference};
use crate::error::{ContainerError, WorkcellError};

/// Seconds the engine waits after `SIGTERM` before killing a stopping
/// container.
pub const STOP_GRACE_PERIOD_SECS: i32 = 5;

const KILL_SIGNAL: &str = "SIGKILL";
const WAIT_CONDITION: &str = "not-running";
const PREFERRED_NETWORK: &str = "bridge";

/// Boxed future type returned by [`ContainerLifecycleClient::create_container`].
pub type CreateContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerCreateResponse, BollardError>> + Send + 'a>>;

/// Boxed future type returned by lifecycle calls with no response body.
pub type EngineCallFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerLifecycleClient::inspect_container`].
pub type InspectContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerInspectResponse, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerLifecycleClient::wait_container`].
///
/// Resolves to the first item of the engine's wait stream, or `None` when the
/// stream closed without one.
pub type WaitContainerFuture<'a> = Pin<
    Box<dyn Future<Output = Option<Result<ContainerWaitResponse, BollardError>>> + Send + 'a>,
>;

/// Behaviour required to drive a container through its lifecycle.
///
/// This abstraction exists to keep lifecycle logic testable without a running
/// daemon.
pub trait ContainerLifecycleClient {
    /// Create a container from `Bollard` options and body payload.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_>;

    /// Start a created container.
    fn start_container(&self, container_id: &str) -> EngineCallFuture<'_>;

    /// Stop a running container.
    fn stop_container(
        &self,
        container_id: &str,
        options: StopContainerOptions,
    ) -> EngineCallFuture<'_>;

    /// Send a signal to a running container.
    fn kill_container(
        &self,
        container_id: &str,
        options: KillContainerOptions,
    ) -> EngineCallFuture<'_>;

    /// Remove a container.
    fn remove_container(
        &self,
        container_id: &str,
        options: RemoveContainerOptions,
    ) -> EngineCallFuture<'_>;

    /// Inspect a container's state and network settings.
    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_>;

    /// Wait for a container to reach the requested condition.
    fn wait_container(
        &self,
        container_id: &str,
        options: WaitContainerOptions,
    ) -> WaitContainerFuture<'_>;
}

impl ContainerLifecycleClient for Docker {
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_> {
        Box::pin(async move { Self::create_container(self, options, config).await })
    }

    fn start_container(&self, container_id: &str) -> EngineCallFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::start_container(self, &container_id_owned, None::<StartContainerOptions>).await
        })
    }

    fn stop_container(
        &self,
        container_id: &str,
        options: StopContainerOptions,
    ) -> EngineCallFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::stop_container(self, &container_id_owned, Some(options)).await })
    }

    fn kill_container(
        &self,
        container_id: &str,
        options: KillContainerOptions,
    ) -> EngineCallFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::kill_container(self, &container_id_owned, Some(options)).await })
    }

    fn remove_container(
        &self,
        container_id: &str,
        options: RemoveContainerOptions,
    ) -> EngineCallFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::remove_container(self, &container_id_owned, Some(options)).await
        })
    }

    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::inspect_container(self, &container_id_owned, None::<InspectContainerOptions>)
                .await
        })
    }

    fn wait_container(
        &self,
        container_id: &str,
        options: WaitContainerOptions,
    ) -> WaitContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            let mut responses =
                std::pin::pin!(Self::wait_container(self, &container_id_owned, Some(options)));
            responses.next().await
        })
    }
}

/// Stream attachment flags applied when a container is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachSettings {
    /// Attach the container's standard input.
    pub stdin: bool,
    /// Attach the container's standard output.
    pub stdout: bool,
    /// Attach the container's standard error.
    pub stderr: bool,
    /// Keep standard input open even when nothing is attached.
    pub open_stdin: bool,
    /// Close standard input after the first attached client disconnects.
    pub stdin_once: bool,
}

impl AttachSettings {
    /// Profile for worker containers: every stream attached, stdin open and
    /// closed after the first client detaches.
    pub const WORKER: Self = Self {
        stdin: true,
        stdout: true,
        stderr: true,
        open_stdin: true,
        stdin_once: true,
    };
}

impl Default for AttachSettings {
    fn default() -> Self {
        Self::WORKER
    }
}

/// What to do with a created container whose start request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartFailurePolicy {
    /// Leave the created container on the daemon for the caller to inspect.
    #[default]
    LeaveContainer,
    /// Force-remove the created container before reporting the failure.
    RemoveContainer,
}

impl StartFailurePolicy {
    /// Map the `launch.remove_on_start_failure` setting to a policy.
    #[must_use]
    pub const fn from_remove_flag(remove: bool) -> Self {
        if remove {
            Self::RemoveContainer
        } else {
            Self::LeaveContainer
        }
    }
}

/// Everything needed to create and start one container.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    image: ImageReference,
    command: Vec<String>,
    env: Option<Vec<String>>,
    name: Option<String>,
    attach: AttachSettings,
    host_config: HostConfig,
    start_failure_policy: StartFailurePolicy,
}

impl LaunchRequest {
    /// Create a request for `image` running `command`.
    ///
    /// An empty command runs the image's default entrypoint and command.
    #[must_use]
    pub fn new(image: ImageReference, command: Vec<String>) -> Self {
        Self {
            image,
            command,
            env: None,
            name: None,
            attach: AttachSettings::WORKER,
            host_config: HostConfig::default(),
            start_failure_policy: StartFailurePolicy::default(),
        }
    }

    /// Set the container name. Blank names are ignored.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|value| !value.trim().is_empty());
        self
    }

    /// Set environment variables in `KEY=value` form.
    #[must_use]
    pub fn with_env(mut self, env: Option<Vec<String>>) -> Self {
        self.env = env.filter(|entries| !entries.is_empty());
        self
    }

    /// Replace the attach flags.
    #[must_use]
    pub const fn with_attach(mut self, attach: AttachSettings) -> Self {
        self.attach = attach;
        self
    }

    /// Set the host configuration supplied at creation.
    #[must_use]
    pub fn with_host_config(mut self, host_config: HostConfig) -> Self {
        self.host_config = host_config;
        self
    }

    /// Choose what happens to the container when start fails.
    #[must_use]
    pub const fn with_start_failure_policy(mut self, policy: StartFailurePolicy) -> Self {
        self.start_failure_policy = policy;
        self
    }

    /// Return the image reference.
    #[must_use]
    pub const fn image(&self) -> &ImageReference {
        &self.image
    }

    /// Return command argv entries.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Return configured environment variables.
    #[must_use]
    pub fn env(&self) -> Option<&[String]> {
        self.env.as_deref()
    }

    /// Return the container name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the attach flags.
    #[must_use]
    pub const fn attach(&self) -> AttachSettings {
        self.attach
    }

    /// Return the host configuration.
    #[must_use]
    pub const fn host_config(&self) -> &HostConfig {
        &self.host_config
    }

    /// Return the start-failure policy.
    #[must_use]
    pub const fn start_failure_policy(&self) -> StartFailurePolicy {
        self.start_failure_policy
    }
}

/// Reference to a container by its daemon-assigned identifier.
///
/// Dropping a handle does not affect the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    id: String,
}

impl ContainerHandle {
    /// Wrap a container identifier or name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Return the container identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Exit status of a finished container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitResult {
    exit_code: i64,
}

impl ExitResult {
    /// Wrap an exit status.
    #[must_use]
    pub const fn new(exit_code: i64) -> Self {
        Self { exit_code }
    }

    /// Return the exit status reported by the engine.
    #[must_use]
    pub const fn exit_code(self) -> i64 {
        self.exit_code
    }

    /// Return true when the container exited with status zero.
    #[must_use]
    pub const fn success(self) -> bool {
        self.exit_code == 0
    }
}

impl EngineConnector {
    /// Create and start a container (async version).
    ///
    /// Start is only attempted after a successful create. The host
    /// configuration is sent with the create request; start carries none.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::CreateFailed` when the engine rejects the
    /// create request.
    ///
    /// Returns `ContainerError::StartFailed` when the engine rejects the
    /// start request. The created container is left in place or removed
    /// according to the request's [`StartFailurePolicy`].
    pub async fn launch_container_async<C: ContainerLifecycleClient>(
        client: &C,
        request: &LaunchRequest,
    ) -> Result<ContainerHandle, WorkcellError> {
        let response = client
            .create_container(
                build_create_options(request.name()),
                build_create_body(request),
            )
            .await
            .map_err(|error| {
                WorkcellError::from(ContainerError::CreateFailed {
                    message: error.to_string(),
                })
            })?;

        for warning in &response.warnings {
            warn!(container_id = %response.id, %warning, "engine reported a create warning");
        }
        let handle = ContainerHandle::new(response.id);
        info!(container_id = %handle, image = %request.image(), "container created");

        if let Err(error) = client.start_container(handle.id()).await {
            let message = error.to_string();
            handle_start_failure(client, &handle, request.start_failure_policy()).await;
            return Err(WorkcellError::from(ContainerError::StartFailed {
                container_id: String::from(handle.id()),
                message,
            }));
        }

        info!(container_id = %handle, "container started");
        Ok(handle)
    }

    /// Create and start a container using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::launch_container_async`].
    pub fn launch_container<C: ContainerLifecycleClient>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        request: &LaunchRequest,
    ) -> Result<ContainerHandle, WorkcellError> {
        runtime.block_on(Self::launch_container_async(client, request))
    }

    /// Stop a container, allowing [`STOP_GRACE_PERIOD_SECS`] before the
    /// engine kills it (async version).
    ///
    /// Stopping a container that is already stopped succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NotFound` for an unknown container and
    /// `ContainerError::EngineRequestFailed` for any other engine failure.
    pub async fn stop_container_async<C: ContainerLifecycleClient>(
        client: &C,
        handle: &ContainerHandle,
    ) -> Result<(), WorkcellError> {
        let options = StopContainerOptionsBuilder::new()
            .t(STOP_GRACE_PERIOD_SECS)
            .build();

        match client.stop_container(handle.id(), options).await {
            Ok(()) => {
                info!(container_id = %handle, "container stopped");
                Ok(())
            }
            Err(error) if engine_status_code(&error) == Some(STATUS_NOT_MODIFIED) => {
                warn!(container_id = %handle, "container was already stopped");
                Ok(())
            }
            Err(error) => Err(WorkcellError::from(classify_request_error(
                "stop",
                handle.id(),
                &error,
            ))),
        }
    }

    /// Stop a container using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::stop_container_async`].
    pub fn stop_container<C: ContainerLifecycleClient>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        handle: &ContainerHandle,
    ) -> Result<(), WorkcellError> {
        runtime.block_on(Self::stop_container_async(client, handle))
    }

    /// Kill a container with `SIGKILL` (async version).
    ///
    /// Killing a container that is not running succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::NotFound` for an unknown container and
    /// `ContainerError::EngineRequestFailed` for any other engine failure.
    pub async fn kill_container_async<C: ContainerLifecycleClient>(
        client: &C,
        handle: &ContainerHandle,
    ) -> Result<(), WorkcellError> {
        let options = KillContainerOptionsBuilder::new()
            .signal(KILL_SIGNAL)
            .build();

        match client.kill_container(handle.id(), options).await {
            Ok(()) => {
                info!(container_id = %handle, "container killed");
                Ok(())
            }
            Err(error)
                if matches!(
                    engine_status_code(&error),
                    Some(STATUS_CONFLICT | STATUS_NOT_MODIFIED)
                ) =>
            {
                warn!(container_id = %handle, "container was not running");
                Ok(())
            }
            Err(error) => Err(WorkcellError::from(classify_request_error(
                "kill",
                handle.id(),
                &error,
            ))),
        }
    }

    /// Kill a container using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::kill_container_async`].
    pub fn kill_container<C: ContainerLifecycleClient>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        handle: &ContainerHandle,
    ) -> Result<(), WorkcellError> {
        runtime.block_on(Self::kill_container_async(client, handle))
    }

    /// Return the container's IP address (async version).
    ///
    /// The `bridge` network is preferred; otherwise the first network by
    /// name with a non-empty address is used.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::AddressUnavailable` when no network carries
    /// an address, `ContainerError::NotFound` for an unknown container and
    /// `ContainerError::EngineRequestFailed` for any other engine failure.
    pub async fn inspect_address_async<C: ContainerLifecycleClient>(
        client: &C,
        handle: &ContainerHandle,
    ) -> Result<String, WorkcellError> {
        let response = client
            .inspect_container(handle.id())
            .await
            .map_err(|error| {
                WorkcellError::from(classify_request_error("inspect", handle.id(), &error))
            })?;

        select_address(response).ok_or_else(|| {
            WorkcellError::from(ContainerError::AddressUnavailable {
                container_id: String::from(handle.id()),
            })
        })
    }

    /// Return the container's IP address using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::inspect_address_async`].
    pub fn inspect_address<C: ContainerLifecycleClient>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        handle: &ContainerHandle,
    ) -> Result<String, WorkcellError> {
        runtime.block_on(Self::inspect_address_async(client, handle))
    }

    /// Block until the container is no longer running and return its exit
    /// status (async version).
    ///
    /// Returns immediately for a container that has already exited.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::Cancelled` or `ContainerError::TimedOut` when
    /// `cancellation` fires first, `ContainerError::NotFound` for an unknown
    /// container and `ContainerError::EngineRequestFailed` for any other
    /// engine failure.
    pub async fn wait_container_async<C: ContainerLifecycleClient>(
        client: &C,
        handle: &ContainerHandle,
        cancellation: &Cancellation,
    ) -> Result<ExitResult, WorkcellError> {
        let options = WaitContainerOptionsBuilder::new()
            .condition(WAIT_CONDITION)
            .build();

        let exit_code = cancellation
            .run("wait", handle.id(), async {
                let outcome = client.wait_container(handle.id(), options).await;
                interpret_wait_outcome(handle, outcome)
            })
            .await?;

        info!(container_id = %handle, exit_code, "container exited");
        Ok(ExitResult::new(exit_code))
    }

    /// Wait for a container to exit using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::wait_container_async`].
    pub fn wait_container<C: ContainerLifecycleClient>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        handle: &ContainerHandle,
        cancellation: &Cancellation,
    ) -> Result<ExitResult, WorkcellError> {
        runtime.block_on(Self::wait_container_async(client, handle, cancellation))
    }
}

async fn handle_start_failure<C: ContainerLifecycleClient>(
    client: &C,
    handle: &ContainerHandle,
    policy: StartFailurePolicy,
) {
    match policy {
        StartFailurePolicy::LeaveContainer => {
            warn!(container_id = %handle, "start failed; created container left in place");
        }
        StartFailurePolicy::RemoveContainer => {
            let options = RemoveContainerOptionsBuilder::new().force(true).build();
            match client.remove_container(handle.id(), options).await {
                Ok(()) => info!(container_id = %handle, "removed container after start failure"),
                Err(error) => warn!(
                    container_id = %handle,
                    %error,
                    "could not remove container after start failure"
                ),
            }
        }
    }
}

fn build_create_options(name: Option<&str>) -> Option<CreateContainerOptions> {
    name.map(|container_name| {
        CreateContainerOptionsBuilder::new()
            .name(container_name)
            .build()
    })
}

fn build_create_body(request: &LaunchRequest) -> ContainerCreateBody {
    let attach = request.attach();
    ContainerCreateBody {
        image: Some(request.image().to_string()),
        cmd: (!request.command().is_empty()).then(|| request.command().to_vec()),
        env: request.env().map(<[String]>::to_vec),
        attach_stdin: Some(attach.stdin),
        attach_stdout: Some(attach.stdout),
        attach_stderr: Some(attach.stderr),
        open_stdin: Some(attach.open_stdin),
        stdin_once: Some(attach.stdin_once),
        host_config: Some(request.host_config().clone()),
        ..ContainerCreateBody::default()
    }
}

fn select_address(response: ContainerInspectResponse) -> Option<String> {
    let mut networks: Vec<_> = response
        .network_settings?
        .networks?
        .into_iter()
        .collect();
    networks.sort_by(|(left, _), (right, _)| {
        (left != PREFERRED_NETWORK, left).cmp(&(right != PREFERRED_NETWORK, right))
    });
    networks
        .into_iter()
        .find_map(|(_, endpoint)| endpoint.ip_address.filter(|address| !address.is_empty()))
}

fn interpret_wait_outcome(
    handle: &ContainerHandle,
    outcome: Option<Result<ContainerWaitResponse, BollardError>>,
) -> Result<i64, WorkcellError> {
    match outcome {
        Some(Ok(response)) => {
            if let Some(message) = response
                .error
                .and_then(|exit_error| exit_error.message)
                .filter(|message| !message.is_empty())
            {
                return Err(wait_failed(handle, message));
            }
            Ok(response.status_code)
        }
        // Bollard reports non-zero exits as errors; the code is still the
        // container's exit status.
        Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
        Some(Err(error)) => Err(WorkcellError::from(classify_request_error(
            "wait",
            handle.id(),
            &error,
        ))),
        None => Err(wait_failed(
            handle,
            String::from("wait stream closed without an exit status"),
        )),
    }
}

fn wait_failed(handle: &ContainerHandle, message: String) -> WorkcellError {
    WorkcellError::from(ContainerError::EngineRequestFailed {
        operation: "wait",
        container_id: String::from(handle.id()),
        message,
    })
}
