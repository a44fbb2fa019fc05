//! Orchestration API for workcell commands.
//!
//! These functions hold the flow behind each CLI subcommand so library
//! embedders get the same behaviour as the binary. They accept library-owned
//! types (not clap types), never print, and never call `std::process::exit`.

use bollard::Docker;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::config::AppConfig;
use crate::engine::{
    Cancellation, ConnectionOverrides, ConnectionResolver, ContainerAttachClient,
    ContainerHandle, ContainerLifecycleClient, EngineConnector, EngineEnvironment, ImagePuller,
    ImageReference, LaunchRequest,
};
use crate::error::Result as WorkcellResult;

/// Outcome of a workcell command.
///
/// Commands return either outright success or the non-zero exit code of the
/// container, which the CLI adapter maps to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command completed successfully (exit code 0).
    Success,
    /// The container exited with a non-zero code.
    CommandExit {
        /// The exit code reported by the container engine.
        code: i64,
    },
}

impl CommandOutcome {
    /// Map a container exit code to an outcome.
    #[must_use]
    pub const fn from_exit_code(code: i64) -> Self {
        if code == 0 {
            Self::Success
        } else {
            Self::CommandExit { code }
        }
    }
}

/// Parameters for [`run_container_async`].
///
/// `stdin` is optional; when present it is copied into the container until
/// EOF. `output` receives the interleaved stdout and stderr of the container.
pub struct RunParams<'a, R: ?Sized, W: ?Sized> {
    /// Container to create and start.
    pub request: LaunchRequest,
    /// Pull the image before creating the container.
    pub pull: bool,
    /// Optional input forwarded to the container's stdin.
    pub stdin: Option<&'a mut R>,
    /// Destination for the container's output.
    pub output: &'a mut W,
    /// Bounds the wait, stdin and output phases.
    pub cancellation: Cancellation,
}

/// Resolve the engine endpoint from configuration plus `env` and connect.
///
/// Unless `verify_engine` is set no request is sent and the first engine
/// call reports an unreachable daemon. With `verify_engine` the engine is
/// pinged on `runtime` before the client is returned.
///
/// # Errors
///
/// Returns `ConfigError` variants when TLS material cannot be resolved,
/// `ContainerError::ConnectionFailed` when the client cannot be built, and
/// `ContainerError::HealthCheckFailed` or `HealthCheckTimeout` when a
/// requested ping fails.
pub fn connect<E: mockable::Env>(
    runtime: &tokio::runtime::Handle,
    config: &AppConfig,
    env: &E,
) -> WorkcellResult<Docker> {
    let resolver = ConnectionResolver::new(EngineEnvironment::capture(env));
    let overrides = ConnectionOverrides::from_app_config(config);
    if config.verify_engine {
        let connection = resolver.resolve(&overrides)?;
        runtime.block_on(EngineConnector::connect_and_verify_async(&connection))
    } else {
        EngineConnector::connect_with_resolver(&resolver, &overrides)
    }
}

/// Run one container to completion (async version).
///
/// Pulls the image when requested, creates and starts the container, then
/// collects output, waits for exit and forwards stdin concurrently. Output
/// collection starts before the wait so no early output is lost.
///
/// # Errors
///
/// Returns the first failure of the pull, launch, wait, output or stdin
/// phases, in that order of precedence. A non-zero container exit is not an
/// error; it is reported as [`CommandOutcome::CommandExit`].
pub async fn run_container_async<C, R, W>(
    client: &C,
    params: RunParams<'_, R, W>,
) -> WorkcellResult<CommandOutcome>
where
    C: ImagePuller + ContainerLifecycleClient + ContainerAttachClient,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let RunParams {
        request,
        pull,
        stdin,
        output,
        cancellation,
    } = params;

    if pull {
        EngineConnector::pull_image_async(client, request.image()).await?;
    }

    let handle = EngineConnector::launch_container_async(client, &request).await?;

    let forward_stdin = async {
        match stdin {
            Some(reader) => {
                EngineConnector::pipe_to_stdin_async(client, &handle, reader, &cancellation)
                    .await
                    .map(Some)
            }
            None => Ok(None),
        }
    };

    let (exit, collected, piped) = tokio::join!(
        EngineConnector::wait_container_async(client, &handle, &cancellation),
        EngineConnector::collect_logs_async(client, &handle, output, &cancellation),
        forward_stdin,
    );

    let exit_result = exit?;
    collected?;
    piped?;

    info!(
        container_id = %handle,
        exit_code = exit_result.exit_code(),
        "container finished"
    );
    Ok(CommandOutcome::from_exit_code(exit_result.exit_code()))
}

/// Run one container to completion using a caller runtime handle.
///
/// # Errors
///
/// Returns the same errors as [`run_container_async`].
pub fn run_container<C, R, W>(
    runtime: &tokio::runtime::Handle,
    client: &C,
    params: RunParams<'_, R, W>,
) -> WorkcellResult<CommandOutcome>
where
    C: ImagePuller + ContainerLifecycleClient + ContainerAttachClient,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    runtime.block_on(run_container_async(client, params))
}

/// Pull an image by reference.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` for an empty reference and
/// `ImageError::PullFailed` when the engine rejects the pull.
pub fn pull_image<C: ImagePuller>(
    runtime: &tokio::runtime::Handle,
    client: &C,
    image: &str,
) -> WorkcellResult<CommandOutcome> {
    let reference = ImageReference::parse(image)?;
    EngineConnector::pull_image(runtime, client, &reference)?;
    Ok(CommandOutcome::Success)
}

/// Stop a container with the standard grace period.
///
/// # Errors
///
/// Returns `ContainerError::NotFound` for an unknown container and
/// `ContainerError::EngineRequestFailed` for other engine failures.
pub fn stop_container<C: ContainerLifecycleClient>(
    runtime: &tokio::runtime::Handle,
    client: &C,
    container: &str,
) -> WorkcellResult<CommandOutcome> {
    EngineConnector::stop_container(runtime, client, &ContainerHandle::new(container))?;
    Ok(CommandOutcome::Success)
}

/// Kill a container immediately.
///
/// # Errors
///
/// Returns `ContainerError::NotFound` for an unknown container and
/// `ContainerError::EngineRequestFailed` for other engine failures.
pub fn kill_container<C: ContainerLifecycleClient>(
    runtime: &tokio::runtime::Handle,
    client: &C,
    container: &str,
) -> WorkcellResult<CommandOutcome> {
    EngineConnector::kill_container(runtime, client, &ContainerHandle::new(container))?;
    Ok(CommandOutcome::Success)
}

/// Return the IP address of a container.
///
/// # Errors
///
/// Returns `ContainerError::NotFound` for an unknown container and
/// `ContainerError::AddressUnavailable` when no network reports an address.
pub fn inspect_address<C: ContainerLifecycleClient>(
    runtime: &tokio::runtime::Handle,
    client: &C,
    container: &str,
) -> WorkcellResult<String> {
    EngineConnector::inspect_address(runtime, client, &ContainerHandle::new(container))
}
