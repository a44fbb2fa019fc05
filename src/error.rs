//! Semantic error types for the workcell library.
//!
//! This module defines the error hierarchy for workcell, following the principle
//! of using semantic error enums (via `thiserror`) for conditions the caller might
//! inspect or retry, while reserving opaque errors (`eyre::Report`) for the
//! application boundary.
//!
//! No variant implies a retry: every failure reported by the engine or the
//! transport is surfaced unchanged to the immediate caller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// TLS was requested but the certificate material could not be resolved.
    #[error("TLS certificates unavailable in '{directory}': {message}")]
    CertificatesUnavailable {
        /// The certificate directory that was searched.
        directory: PathBuf,
        /// A description of what is missing.
        message: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    ///
    /// This wraps errors from the layered configuration system, including:
    /// - Configuration file parsing errors
    /// - Environment variable parsing errors
    /// - CLI argument parsing errors
    /// - Missing required fields after layer merging
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Failed to create the tokio runtime used by the synchronous helpers.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container: {message}")]
    CreateFailed {
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    ///
    /// The container object exists on the daemon unless the launch request
    /// asked for it to be removed on start failure.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// The daemon does not know the referenced container.
    #[error("container '{container_id}' not found")]
    NotFound {
        /// The unknown container identifier.
        container_id: String,
    },

    /// The container has no network address assigned.
    #[error("container '{container_id}' has no network address")]
    AddressUnavailable {
        /// The ID of the inspected container.
        container_id: String,
    },

    /// Attaching to or streaming from a container failed.
    #[error("attach to container '{container_id}' failed: {message}")]
    AttachFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the stream failure.
        message: String,
    },

    /// Any other engine-reported failure, passed through unchanged.
    #[error("{operation} failed for container '{container_id}': {message}")]
    EngineRequestFailed {
        /// The lifecycle operation that was attempted.
        operation: &'static str,
        /// The ID of the container.
        container_id: String,
        /// The engine-supplied message.
        message: String,
    },

    /// The caller cancelled a blocking operation.
    #[error("{operation} on container '{container_id}' was cancelled")]
    Cancelled {
        /// The operation that was cancelled.
        operation: &'static str,
        /// The ID of the container.
        container_id: String,
    },

    /// A blocking operation exceeded its caller-supplied deadline.
    #[error("{operation} on container '{container_id}' timed out after {deadline:?}")]
    TimedOut {
        /// The operation that timed out.
        operation: &'static str,
        /// The ID of the container.
        container_id: String,
        /// The deadline that expired.
        deadline: Duration,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// Errors that can occur while fetching images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The engine could not pull the image.
    #[error("failed to pull image '{image}': {message}")]
    PullFailed {
        /// The `repository:tag` reference that was requested.
        image: String,
        /// The engine-supplied failure message.
        message: String,
    },
}

/// Top-level error type for the workcell library.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the crate. At the application boundary (main.rs), these
/// errors are converted to `eyre::Report` for human-readable error reporting.
#[derive(Debug, Error)]
pub enum WorkcellError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred during container operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred while fetching an image.
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// A specialised `Result` type for workcell operations.
pub type Result<T> = std::result::Result<T, WorkcellError>;
