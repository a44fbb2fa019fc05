//! Health check and connect-and-verify functionality.
//!
//! This module provides health check operations for container engines,
//! including async and sync variants for both standalone health checks
//! and combined connect-and-verify operations.

use std::time::Duration;

use bollard::Docker;
use tracing::debug;

use super::{ConnectionConfig, EngineConnector, HEALTH_CHECK_TIMEOUT_SECS};
use crate::error::{ContainerError, WorkcellError};

impl EngineConnector {
    /// Perform a ping with timeout (internal helper).
    ///
    /// This is the core async implementation reused by all health check APIs.
    async fn ping_with_timeout(docker: &Docker) -> Result<(), WorkcellError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| {
                WorkcellError::from(ContainerError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|e| {
                WorkcellError::from(ContainerError::HealthCheckFailed {
                    message: e.to_string(),
                })
            })?;
        debug!("container engine answered ping");
        Ok(())
    }

    /// Verify the container engine is responsive (async version).
    ///
    /// Sends a ping request to the engine and waits for a response.
    /// This confirms the engine is operational, not just that the socket
    /// is reachable.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::HealthCheckFailed` if the engine does not
    /// respond correctly.
    ///
    /// Returns `ContainerError::HealthCheckTimeout` if the check times out.
    pub async fn health_check_async(docker: &Docker) -> Result<(), WorkcellError> {
        Self::ping_with_timeout(docker).await
    }

    /// Verify the container engine is responsive.
    ///
    /// This is the synchronous version that creates a dedicated tokio runtime
    /// to execute the async health check. Use [`Self::health_check_async`]
    /// when already in an async context.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` if the tokio runtime
    /// cannot be created, otherwise the errors of
    /// [`Self::health_check_async`].
    pub fn health_check(docker: &Docker) -> Result<(), WorkcellError> {
        let rt = Self::create_runtime()?;
        rt.block_on(Self::health_check_async(docker))
    }

    /// Connect with a resolved configuration and verify the engine responds
    /// (async version).
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect_with_config`] and
    /// [`Self::health_check_async`].
    pub async fn connect_and_verify_async(
        config: &ConnectionConfig,
    ) -> Result<Docker, WorkcellError> {
        let docker = Self::connect_with_config(config)?;
        Self::ping_with_timeout(&docker).await?;
        Ok(docker)
    }

    /// Connect with a resolved configuration and verify the engine responds.
    ///
    /// This is the synchronous version that creates a dedicated tokio runtime.
    /// Use [`Self::connect_and_verify_async`] when already in an async context.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` if the tokio runtime
    /// cannot be created, otherwise the errors of
    /// [`Self::connect_and_verify_async`].
    pub fn connect_and_verify(config: &ConnectionConfig) -> Result<Docker, WorkcellError> {
        let rt = Self::create_runtime()?;
        rt.block_on(Self::connect_and_verify_async(config))
    }
}
