//! Endpoint resolution and container engine connection.
//!
//! This module turns a resolved [`ConnectionConfig`] into a `Bollard` client.
//! Socket, HTTP and TLS endpoints are supported; a single failed attempt is
//! reported immediately and never retried.

mod cancellation;
mod error_classification;
mod health_check;
mod image;
mod lifecycle;
mod resolver;
mod streams;

use bollard::Docker;
use tracing::{debug, warn};

pub use cancellation::Cancellation;
pub use image::{CreateImageStream, ImagePuller, ImageReference};
pub use lifecycle::{
    AttachSettings, ContainerHandle, ContainerLifecycleClient, CreateContainerFuture,
    EngineCallFuture, ExitResult, InspectContainerFuture, LaunchRequest, STOP_GRACE_PERIOD_SECS,
    StartFailurePolicy, WaitContainerFuture,
};
pub use resolver::{
    CA_CERT_FILE, CLIENT_CERT_FILE, CLIENT_KEY_FILE, ConnectionConfig, ConnectionOverrides,
    ConnectionResolver, DOCKER_CERT_PATH_VAR, DOCKER_HOST_VAR, DOCKER_TLS_VERIFY_VAR,
    EngineEnvironment, HOME_VAR, TlsMaterial,
};
pub use streams::{AttachContainerFuture, ContainerAttachClient, LogStream};

use self::error_classification::classify_connection_error;
use crate::error::{ContainerError, WorkcellError};

/// Connection timeout in seconds for engine API requests.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Timeout in seconds for health check operations.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Classifies socket endpoint types for connection handling.
enum SocketType {
    /// Unix socket or Windows named pipe with explicit scheme.
    Socket,
    /// HTTP, HTTPS, or TCP endpoint.
    Http,
    /// Bare path without scheme prefix.
    BarePath,
}

impl SocketType {
    /// Returns true if the socket string has a Unix or named pipe scheme.
    fn is_socket_scheme(socket: &str) -> bool {
        socket.starts_with("unix://") || socket.starts_with("npipe://")
    }

    /// Returns true if the socket string has an HTTP-compatible scheme.
    fn is_http_scheme(socket: &str) -> bool {
        socket.starts_with("tcp://")
            || socket.starts_with("http://")
            || socket.starts_with("https://")
    }

    /// Classify a socket string by its scheme prefix.
    fn classify(socket: &str) -> Self {
        match (Self::is_socket_scheme(socket), Self::is_http_scheme(socket)) {
            (true, _) => Self::Socket,
            (_, true) => Self::Http,
            _ => Self::BarePath,
        }
    }
}

/// Provides methods to connect to Docker-compatible container engines and to
/// drive container lifecycles through them.
///
/// The connector supports Unix sockets, Windows named pipes, HTTP, and
/// TLS-secured HTTPS endpoints. Lifecycle, image and stream operations are
/// implemented in sibling modules as associated functions generic over the
/// client seams, so they can be exercised without a running daemon.
pub struct EngineConnector;

impl EngineConnector {
    /// Connect to the container engine at the specified endpoint without TLS.
    ///
    /// Supports the following endpoint formats:
    /// - Unix sockets: `unix:///path/to/socket`
    /// - Windows named pipes: `npipe:////./pipe/name`
    /// - TCP: `tcp://host:port` (treated as HTTP connection)
    /// - HTTP: `http://host:port`
    /// - Bare paths: paths starting with `\\` or `//` are treated as Windows
    ///   named pipes; all other paths are treated as Unix sockets.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed`, `SocketNotFound` or
    /// `PermissionDenied` if the client cannot be created.
    pub fn connect(socket: &str) -> Result<Docker, WorkcellError> {
        match SocketType::classify(socket) {
            SocketType::Socket => Docker::connect_with_socket(
                socket,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            SocketType::Http => {
                // Rewrite tcp:// to http:// for Bollard compatibility
                let http_socket = if socket.starts_with("tcp://") {
                    socket.replacen("tcp://", "http://", 1)
                } else {
                    socket.to_owned()
                };
                Docker::connect_with_http(
                    &http_socket,
                    CONNECTION_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                )
            }
            SocketType::BarePath => {
                let socket_uri = Self::normalize_bare_path(socket);
                Docker::connect_with_socket(
                    &socket_uri,
                    CONNECTION_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                )
            }
        }
        .map_err(|e| WorkcellError::from(classify_connection_error(&e, socket)))
    }

    /// Connect to a TLS-secured network endpoint.
    ///
    /// Socket endpoints carry no TLS; for them the certificate material is
    /// ignored and a plain socket connection is made.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed` if the TLS client cannot be
    /// constructed (for example, unreadable or malformed PEM files).
    pub fn connect_tls(socket: &str, tls: &TlsMaterial) -> Result<Docker, WorkcellError> {
        if !matches!(SocketType::classify(socket), SocketType::Http) {
            warn!(
                endpoint = socket,
                "TLS certificates ignored for local socket endpoint"
            );
            return Self::connect(socket);
        }

        let https_socket = Self::rewrite_to_https(socket);
        Docker::connect_with_ssl(
            &https_socket,
            tls.key().as_std_path(),
            tls.cert().as_std_path(),
            tls.ca().as_std_path(),
            CONNECTION_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            WorkcellError::from(ContainerError::ConnectionFailed {
                message: format!("TLS setup for {https_socket} failed: {e}"),
            })
        })
    }

    /// Connect using a fully resolved connection configuration.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect`] or [`Self::connect_tls`].
    pub fn connect_with_config(config: &ConnectionConfig) -> Result<Docker, WorkcellError> {
        debug!(
            endpoint = config.host(),
            tls = config.tls().is_some(),
            "connecting to container engine"
        );
        match config.tls() {
            Some(tls) => Self::connect_tls(config.host(), tls),
            None => Self::connect(config.host()),
        }
    }

    /// Resolve the connection configuration and connect.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` variants when resolution fails (before any
    /// network activity), otherwise the errors of
    /// [`Self::connect_with_config`].
    pub fn connect_with_resolver(
        resolver: &ConnectionResolver,
        overrides: &ConnectionOverrides,
    ) -> Result<Docker, WorkcellError> {
        let config = resolver.resolve(overrides)?;
        Self::connect_with_config(&config)
    }

    /// Normalize a bare socket path to a URI with the appropriate scheme.
    ///
    /// Paths starting with `\\` or `//` are assumed to be Windows named pipe
    /// paths and are prefixed with `npipe://`. All other paths are assumed to
    /// be Unix socket paths and are prefixed with `unix://`.
    fn normalize_bare_path(path: &str) -> String {
        if path.starts_with("\\\\") || path.starts_with("//") {
            format!("npipe://{path}")
        } else {
            format!("unix://{path}")
        }
    }

    /// Rewrite `tcp://` and `http://` endpoints to `https://`.
    fn rewrite_to_https(socket: &str) -> String {
        socket
            .strip_prefix("tcp://")
            .or_else(|| socket.strip_prefix("http://"))
            .map_or_else(|| socket.to_owned(), |rest| format!("https://{rest}"))
    }

    /// Create a tokio runtime for synchronous operations.
    fn create_runtime() -> Result<tokio::runtime::Runtime, WorkcellError> {
        tokio::runtime::Runtime::new().map_err(|e| {
            WorkcellError::from(ContainerError::RuntimeCreationFailed {
                message: e.to_string(),
            })
        })
    }
}
