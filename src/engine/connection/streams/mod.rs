//! Attach-channel streaming: piping input into a container's stdin and
//! collecting its combined output.
//!
//! Both directions run over the engine's attach endpoint. Input forwarding
//! finishes when the local reader reaches EOF or the engine closes the attach
//! channel; output collection finishes when the container closes its output.
//! Each call is bounded by the caller's [`Cancellation`].

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::container::{AttachContainerResults, LogOutput};
use bollard::errors::Error as BollardError;
use bollard::query_parameters::{
    AttachContainerOptions, AttachContainerOptionsBuilder, LogsOptions, LogsOptionsBuilder,
};
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::error_classification::{STATUS_CONFLICT, engine_status_code};
use super::{Cancellation, ContainerHandle, EngineConnector};
use crate::error::{ContainerError, WorkcellError};

/// Read size used when forwarding stdin.
const STDIN_CHUNK_BYTES: usize = 8 * 1024;

/// Boxed future type returned by [`ContainerAttachClient::attach_container`].
pub type AttachContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AttachContainerResults, BollardError>> + Send + 'a>>;

/// Boxed output stream returned by [`ContainerAttachClient::container_logs`].
pub type LogStream<'a> = Pin<Box<dyn Stream<Item = Result<LogOutput, BollardError>> + Send + 'a>>;

/// Behaviour required to attach to a container's standard streams.
///
/// This abstraction keeps stream forwarding testable without a live daemon.
pub trait ContainerAttachClient {
    /// Attach to a container with the given stream selection.
    fn attach_container(
        &self,
        container_id: &str,
        options: AttachContainerOptions,
    ) -> AttachContainerFuture<'_>;

    /// Read a container's recorded output from the logs endpoint.
    fn container_logs(&self, container_id: &str, options: LogsOptions) -> LogStream<'_>;
}

impl ContainerAttachClient for Docker {
    fn attach_container(
        &self,
        container_id: &str,
        options: AttachContainerOptions,
    ) -> AttachContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::attach_container(self, &container_id_owned, Some(options)).await
        })
    }

    fn container_logs(&self, container_id: &str, options: LogsOptions) -> LogStream<'_> {
        Box::pin(Self::logs(self, container_id, Some(options)))
    }
}

/// How stdin forwarding ended.
enum StdinEnd {
    /// The local reader reached EOF.
    ReaderExhausted,
    /// The engine closed the attach channel, normally because the container
    /// exited.
    ChannelClosed,
}

/// Forward `reader` into `input` until the reader reaches EOF or `output`
/// ends. Frames arriving on `output` are discarded.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "false positive triggered inside tokio::select! expansion"
)]
async fn forward_stdin<R, I, S>(
    handle: &ContainerHandle,
    reader: &mut R,
    input: &mut I,
    output: &mut S,
) -> Result<(u64, StdinEnd), WorkcellError>
where
    R: AsyncRead + Unpin + ?Sized,
    I: AsyncWrite + Unpin + ?Sized,
    S: Stream<Item = Result<LogOutput, BollardError>> + Unpin + ?Sized,
{
    let mut buffer = vec![0_u8; STDIN_CHUNK_BYTES];
    let mut copied: u64 = 0;

    loop {
        tokio::select! {
            biased;
            read = reader.read(&mut buffer) => {
                let count = read
                    .map_err(|error| attach_failed(handle, format!("reading stdin: {error}")))?;
                let Some(chunk) = buffer.get(..count).filter(|chunk| !chunk.is_empty()) else {
                    return Ok((copied, StdinEnd::ReaderExhausted));
                };
                input
                    .write_all(chunk)
                    .await
                    .map_err(|error| attach_failed(handle, format!("writing stdin: {error}")))?;
                copied = copied.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
            }
            frame = output.next() => {
                if frame.is_none() {
                    return Ok((copied, StdinEnd::ChannelClosed));
                }
            }
        }
    }
}

impl EngineConnector {
    /// Copy `reader` into the container's stdin until EOF or until the engine
    /// closes the attach channel (async version).
    ///
    /// On EOF the attached input is flushed and shut down, so containers
    /// created with `stdin_once` see their stdin closed. When the container
    /// exits first, forwarding stops without waiting for the reader. Returns
    /// the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::AttachFailed` when attaching, reading,
    /// writing or closing the input fails, and `ContainerError::Cancelled` or
    /// `ContainerError::TimedOut` when `cancellation` fires first.
    pub async fn pipe_to_stdin_async<C, R>(
        client: &C,
        handle: &ContainerHandle,
        reader: &mut R,
        cancellation: &Cancellation,
    ) -> Result<u64, WorkcellError>
    where
        C: ContainerAttachClient,
        R: AsyncRead + Unpin + ?Sized,
    {
        let options = AttachContainerOptionsBuilder::new()
            .stdin(true)
            .stream(true)
            .build();

        cancellation
            .run("pipe_stdin", handle.id(), async {
                let AttachContainerResults {
                    mut output,
                    mut input,
                } = client
                    .attach_container(handle.id(), options)
                    .await
                    .map_err(|error| attach_failed(handle, format!("attach for stdin: {error}")))?;

                let (copied, end) = forward_stdin(handle, reader, &mut input, &mut output).await?;
                match end {
                    StdinEnd::ReaderExhausted => {
                        input.flush().await.map_err(|error| {
                            attach_failed(handle, format!("flushing stdin: {error}"))
                        })?;
                        input.shutdown().await.map_err(|error| {
                            attach_failed(handle, format!("closing stdin: {error}"))
                        })?;
                        debug!(container_id = %handle, bytes = copied, "stdin closed");
                    }
                    StdinEnd::ChannelClosed => {
                        debug!(
                            container_id = %handle,
                            bytes = copied,
                            "attach channel closed before stdin reached EOF"
                        );
                    }
                }
                Ok::<_, WorkcellError>(copied)
            })
            .await
    }

    /// Pipe a reader into the container's stdin using a caller runtime
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::pipe_to_stdin_async`].
    pub fn pipe_to_stdin<C, R>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        handle: &ContainerHandle,
        reader: &mut R,
        cancellation: &Cancellation,
    ) -> Result<u64, WorkcellError>
    where
        C: ContainerAttachClient,
        R: AsyncRead + Unpin + ?Sized,
    {
        runtime.block_on(Self::pipe_to_stdin_async(
            client,
            handle,
            reader,
            cancellation,
        ))
    }

    /// Write the container's existing and future stdout and stderr into
    /// `writer` until the container closes its output (async version).
    ///
    /// Both streams are interleaved into the single writer in arrival order.
    /// When the engine refuses the attach because the container has already
    /// stopped, the recorded output is read from the logs endpoint instead.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::AttachFailed` when attaching, reading the
    /// stream or writing output fails, and `ContainerError::Cancelled` or
    /// `ContainerError::TimedOut` when `cancellation` fires first.
    pub async fn collect_logs_async<C, W>(
        client: &C,
        handle: &ContainerHandle,
        writer: &mut W,
        cancellation: &Cancellation,
    ) -> Result<(), WorkcellError>
    where
        C: ContainerAttachClient,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let options = AttachContainerOptionsBuilder::new()
            .logs(true)
            .stream(true)
            .stdout(true)
            .stderr(true)
            .build();

        cancellation
            .run("collect_logs", handle.id(), async {
                let mut output: LogStream<'_> =
                    match client.attach_container(handle.id(), options).await {
                        Ok(AttachContainerResults {
                            output: attached,
                            input,
                        }) => {
                            drop(input);
                            attached
                        }
                        Err(error) if engine_status_code(&error) == Some(STATUS_CONFLICT) => {
                            debug!(
                                container_id = %handle,
                                "container already stopped; reading recorded output"
                            );
                            client.container_logs(handle.id(), recorded_output_options())
                        }
                        Err(error) => {
                            return Err(attach_failed(
                                handle,
                                format!("attach for output: {error}"),
                            ));
                        }
                    };

                while let Some(next) = output.next().await {
                    let frame = next
                        .map_err(|error| attach_failed(handle, format!("output stream: {error}")))?;
                    writer
                        .write_all(frame_payload(&frame))
                        .await
                        .map_err(|error| attach_failed(handle, format!("writing output: {error}")))?;
                }
                writer
                    .flush()
                    .await
                    .map_err(|error| attach_failed(handle, format!("flushing output: {error}")))?;

                debug!(container_id = %handle, "output stream closed");
                Ok::<_, WorkcellError>(())
            })
            .await
    }

    /// Collect the container's output using a caller runtime handle.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::collect_logs_async`].
    pub fn collect_logs<C, W>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        handle: &ContainerHandle,
        writer: &mut W,
        cancellation: &Cancellation,
    ) -> Result<(), WorkcellError>
    where
        C: ContainerAttachClient,
        W: AsyncWrite + Unpin + ?Sized,
    {
        runtime.block_on(Self::collect_logs_async(
            client,
            handle,
            writer,
            cancellation,
        ))
    }
}

/// Logs-endpoint options matching the output attach: both streams, followed
/// until the container's output ends.
fn recorded_output_options() -> LogsOptions {
    LogsOptionsBuilder::new()
        .follow(true)
        .stdout(true)
        .stderr(true)
        .build()
}

fn frame_payload(frame: &LogOutput) -> &[u8] {
    match frame {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::StdIn { message }
        | LogOutput::Console { message } => message.as_ref(),
    }
}

fn attach_failed(handle: &ContainerHandle, message: String) -> WorkcellError {
    WorkcellError::from(ContainerError::AttachFailed {
        container_id: String::from(handle.id()),
        message,
    })
}
