//! Container engine connection and container lifecycle management.
//!
//! The engine endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `WORKCELL_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. Platform default (`/var/run/docker.sock` on Unix)
//!
//! TLS is enabled by `tls.verify` in configuration or a non-empty
//! `DOCKER_TLS_VERIFY`. Once connected, [`EngineConnector`] drives image
//! pulls, container lifecycles and attach streams through the trait seams
//! re-exported here, all of which `bollard::Docker` implements.

mod connection;

pub use connection::{
    AttachContainerFuture, AttachSettings, CA_CERT_FILE, CLIENT_CERT_FILE, CLIENT_KEY_FILE,
    Cancellation, ConnectionConfig, ConnectionOverrides, ConnectionResolver,
    ContainerAttachClient, ContainerHandle, ContainerLifecycleClient, CreateContainerFuture,
    CreateImageStream, DOCKER_CERT_PATH_VAR, DOCKER_HOST_VAR, DOCKER_TLS_VERIFY_VAR,
    EngineCallFuture, EngineConnector, EngineEnvironment, ExitResult, HOME_VAR, ImagePuller,
    ImageReference, InspectContainerFuture, LaunchRequest, LogStream, STOP_GRACE_PERIOD_SECS,
    StartFailurePolicy, TlsMaterial, WaitContainerFuture,
};
