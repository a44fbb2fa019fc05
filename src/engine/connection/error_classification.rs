//! Error classification helpers for container engine failures.
//!
//! This module converts low-level `Bollard` errors into semantic
//! `ContainerError` variants so callers receive actionable diagnostics.

use std::path::Path;

use bollard::errors::Error as BollardError;

use crate::error::ContainerError;

/// HTTP status the engine returns when the container was already in the
/// requested state.
pub(super) const STATUS_NOT_MODIFIED: u16 = 304;

/// HTTP status the engine returns for an unknown container.
pub(super) const STATUS_NOT_FOUND: u16 = 404;

/// HTTP status the engine returns when the container is in the wrong state
/// (for example, killing a container that is not running).
pub(super) const STATUS_CONFLICT: u16 = 409;

/// Extract the filesystem path from a socket URI.
///
/// Strips the scheme prefix (`unix://`, `npipe://`) to get the raw path.
/// For HTTP endpoints or bare paths, returns `None` as they either do not have
/// filesystem paths or lack the scheme prefix needed for reliable extraction.
pub(super) fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Path::new)
}

/// Classify an I/O error kind into a semantic `ContainerError`.
///
/// Maps specific `ErrorKind` variants to their corresponding `ContainerError`
/// variants when a socket path is available, falling back to `ConnectionFailed`
/// for other error kinds or when no path can be extracted.
fn classify_io_error_kind(
    kind: std::io::ErrorKind,
    socket_path: Option<&Path>,
    error_msg: &str,
) -> ContainerError {
    let connection_failed = || ContainerError::ConnectionFailed {
        message: error_msg.to_owned(),
    };
    match (kind, socket_path) {
        (std::io::ErrorKind::PermissionDenied, Some(path)) => ContainerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        (std::io::ErrorKind::NotFound, Some(path)) => ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        },
        _ => connection_failed(),
    }
}

/// Classify a `Bollard` connection error into a semantic `ContainerError`.
///
/// Inspects the error type and underlying cause to determine the most
/// specific error variant. Falls back to `ConnectionFailed` for errors
/// that do not match known patterns or for endpoints without filesystem paths.
pub(super) fn classify_connection_error(
    bollard_error: &BollardError,
    socket_uri: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket_uri);
    let error_msg = bollard_error.to_string();

    match bollard_error {
        BollardError::SocketNotFoundError(_) => {
            if let Some(path) = socket_path {
                return ContainerError::SocketNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        BollardError::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            return classify_io_error_kind(kind, socket_path, &error_msg);
        }
        _ => {}
    }

    if let Some(kind) = io_error_kind_in_chain(bollard_error) {
        return classify_io_error_kind(kind, socket_path, &error_msg);
    }

    ContainerError::ConnectionFailed { message: error_msg }
}

/// Return the HTTP status code of an engine response error, if any.
pub(super) const fn engine_status_code(error: &BollardError) -> Option<u16> {
    match error {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

/// Classify a failed lifecycle request against a known container id.
///
/// Unknown containers map to `NotFound`; every other failure is passed
/// through with the engine's message.
pub(super) fn classify_request_error(
    operation: &'static str,
    container_id: &str,
    error: &BollardError,
) -> ContainerError {
    if engine_status_code(error) == Some(STATUS_NOT_FOUND) {
        return ContainerError::NotFound {
            container_id: String::from(container_id),
        };
    }

    ContainerError::EngineRequestFailed {
        operation,
        container_id: String::from(container_id),
        message: error.to_string(),
    }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
