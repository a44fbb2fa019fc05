//! Connection resolution from an explicit environment snapshot.
//!
//! The process environment is read exactly once, into an
//! [`EngineEnvironment`], and everything downstream works from that value.
//! This keeps endpoint and certificate resolution testable without mutating
//! the real environment.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use crate::config::AppConfig;
use crate::error::{ConfigError, WorkcellError};

/// Environment variable naming the engine endpoint.
pub const DOCKER_HOST_VAR: &str = "DOCKER_HOST";

/// Environment variable that enables TLS when set to any non-empty value.
pub const DOCKER_TLS_VERIFY_VAR: &str = "DOCKER_TLS_VERIFY";

/// Environment variable naming the TLS certificate directory.
pub const DOCKER_CERT_PATH_VAR: &str = "DOCKER_CERT_PATH";

/// Environment variable naming the user's home directory.
pub const HOME_VAR: &str = "HOME";

/// Directory below `HOME` holding the engine client certificates.
const DEFAULT_CERT_DIR_NAME: &str = ".docker";

/// Client certificate file name inside the certificate directory.
pub const CLIENT_CERT_FILE: &str = "cert.pem";

/// Client key file name inside the certificate directory.
pub const CLIENT_KEY_FILE: &str = "key.pem";

/// Certificate authority file name inside the certificate directory.
pub const CA_CERT_FILE: &str = "ca.pem";

/// Default socket path for Unix platforms.
#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// Default socket path for Windows platforms.
#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Immutable snapshot of the environment inputs used for connection resolution.
///
/// Empty values are normalised to `None` at capture time, so an exported but
/// empty `DOCKER_HOST` behaves exactly like an unset one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineEnvironment {
    docker_host: Option<String>,
    tls_verify: Option<String>,
    cert_path: Option<String>,
    home: Option<String>,
}

impl EngineEnvironment {
    /// Capture the connection-relevant variables from an environment provider.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use mockable::DefaultEnv;
    /// use workcell::engine::EngineEnvironment;
    ///
    /// let environment = EngineEnvironment::capture(&DefaultEnv::new());
    /// ```
    #[must_use]
    pub fn capture<E: mockable::Env>(env: &E) -> Self {
        let read = |name: &str| env.string(name).filter(|value| !value.is_empty());
        Self {
            docker_host: read(DOCKER_HOST_VAR),
            tls_verify: read(DOCKER_TLS_VERIFY_VAR),
            cert_path: read(DOCKER_CERT_PATH_VAR),
            home: read(HOME_VAR),
        }
    }

    /// Set the endpoint override.
    #[must_use]
    pub fn with_docker_host(mut self, value: impl Into<String>) -> Self {
        self.docker_host = Some(value.into()).filter(|v: &String| !v.is_empty());
        self
    }

    /// Set the TLS flag value.
    #[must_use]
    pub fn with_tls_verify(mut self, value: impl Into<String>) -> Self {
        self.tls_verify = Some(value.into()).filter(|v: &String| !v.is_empty());
        self
    }

    /// Set the certificate directory override.
    #[must_use]
    pub fn with_cert_path(mut self, value: impl Into<String>) -> Self {
        self.cert_path = Some(value.into()).filter(|v: &String| !v.is_empty());
        self
    }

    /// Set the home directory.
    #[must_use]
    pub fn with_home(mut self, value: impl Into<String>) -> Self {
        self.home = Some(value.into()).filter(|v: &String| !v.is_empty());
        self
    }

    /// Return the endpoint override, if any.
    #[must_use]
    pub fn docker_host(&self) -> Option<&str> {
        self.docker_host.as_deref()
    }

    /// Return whether the environment requests TLS.
    #[must_use]
    pub const fn tls_requested(&self) -> bool {
        self.tls_verify.is_some()
    }

    /// Return the certificate directory override, if any.
    #[must_use]
    pub fn cert_path(&self) -> Option<&str> {
        self.cert_path.as_deref()
    }

    /// Return the home directory, if any.
    #[must_use]
    pub fn home(&self) -> Option<&str> {
        self.home.as_deref()
    }
}

/// Connection settings taken from layered configuration.
///
/// These sit above the environment snapshot: an explicit socket or certificate
/// path here always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    /// Explicit engine endpoint.
    pub socket: Option<String>,

    /// Force TLS even when `DOCKER_TLS_VERIFY` is unset.
    pub tls_verify: bool,

    /// Explicit certificate directory.
    pub cert_path: Option<Utf8PathBuf>,
}

impl ConnectionOverrides {
    /// Build overrides from the application configuration.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            socket: config.engine_socket.clone(),
            tls_verify: config.tls.verify,
            cert_path: config.tls.cert_path.clone(),
        }
    }
}

/// Certificate material for a TLS-secured engine connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    directory: Utf8PathBuf,
}

impl TlsMaterial {
    /// Validate that `directory` holds `cert.pem`, `key.pem` and `ca.pem`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CertificatesUnavailable` when the directory
    /// cannot be opened or any of the three files is missing.
    pub fn from_directory(directory: &Utf8Path) -> Result<Self, WorkcellError> {
        let dir = Dir::open_ambient_dir(directory, ambient_authority()).map_err(|error| {
            certificates_unavailable(directory, format!("cannot open directory: {error}"))
        })?;

        let missing: Vec<&str> = [CLIENT_CERT_FILE, CLIENT_KEY_FILE, CA_CERT_FILE]
            .into_iter()
            .filter(|name| !dir.is_file(name))
            .collect();

        if !missing.is_empty() {
            return Err(certificates_unavailable(
                directory,
                format!("missing {}", missing.join(", ")),
            ));
        }

        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    /// Return the certificate directory.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Return the client certificate path.
    #[must_use]
    pub fn cert(&self) -> Utf8PathBuf {
        self.directory.join(CLIENT_CERT_FILE)
    }

    /// Return the client key path.
    #[must_use]
    pub fn key(&self) -> Utf8PathBuf {
        self.directory.join(CLIENT_KEY_FILE)
    }

    /// Return the certificate authority path.
    #[must_use]
    pub fn ca(&self) -> Utf8PathBuf {
        self.directory.join(CA_CERT_FILE)
    }
}

fn certificates_unavailable(directory: &Utf8Path, message: String) -> WorkcellError {
    WorkcellError::from(ConfigError::CertificatesUnavailable {
        directory: directory.as_std_path().to_path_buf(),
        message,
    })
}

/// Fully resolved description of how to reach the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    tls: Option<TlsMaterial>,
}

impl ConnectionConfig {
    /// Create a configuration for a plain (non-TLS) endpoint.
    #[must_use]
    pub fn plain(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            tls: None,
        }
    }

    /// Create a configuration for a TLS-secured endpoint.
    #[must_use]
    pub fn with_tls(host: impl Into<String>, tls: TlsMaterial) -> Self {
        Self {
            host: host.into(),
            tls: Some(tls),
        }
    }

    /// Return the engine endpoint.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Return the TLS material, when TLS is enabled.
    #[must_use]
    pub const fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }
}

/// Resolves a [`ConnectionConfig`] from configuration overrides and an
/// environment snapshot.
///
/// Resolution order for the endpoint:
/// 1. `overrides.socket` (from CLI, config file, or `WORKCELL_ENGINE_SOCKET`)
/// 2. `DOCKER_HOST`
/// 3. Platform default socket
///
/// TLS is enabled when `overrides.tls_verify` is set or `DOCKER_TLS_VERIFY` is
/// non-empty. The certificate directory is then `overrides.cert_path`, else
/// `DOCKER_CERT_PATH`, else `$HOME/.docker`.
#[derive(Debug, Clone)]
pub struct ConnectionResolver {
    environment: EngineEnvironment,
}

impl ConnectionResolver {
    /// Creates a resolver over the given environment snapshot.
    #[must_use]
    pub const fn new(environment: EngineEnvironment) -> Self {
        Self { environment }
    }

    /// Returns the platform default socket path.
    ///
    /// On Unix systems, this is `unix:///var/run/docker.sock`.
    /// On Windows systems, this is `npipe:////./pipe/docker_engine`.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }

    /// Resolves the engine endpoint without touching TLS settings.
    #[must_use]
    pub fn resolve_host(&self, overrides: &ConnectionOverrides) -> String {
        overrides
            .socket
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.environment.docker_host())
            .map_or_else(|| DEFAULT_SOCKET.to_owned(), String::from)
    }

    /// Resolves the certificate directory for a TLS connection.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when no explicit path is
    /// configured and `HOME` is unset, and `ConfigError::InvalidValue` when
    /// the home-relative path cannot be made absolute.
    pub fn resolve_cert_dir(
        &self,
        overrides: &ConnectionOverrides,
    ) -> Result<Utf8PathBuf, WorkcellError> {
        if let Some(path) = overrides.cert_path.as_ref().filter(|p| !p.as_str().is_empty()) {
            return Ok(path.clone());
        }

        if let Some(path) = self.environment.cert_path() {
            return Ok(Utf8PathBuf::from(path));
        }

        let home = self.environment.home().ok_or_else(|| {
            WorkcellError::from(ConfigError::MissingRequired {
                field: format!("{HOME_VAR} (required when {DOCKER_CERT_PATH_VAR} is not set)"),
            })
        })?;

        absolute(&Utf8PathBuf::from(home).join(DEFAULT_CERT_DIR_NAME))
    }

    /// Resolves the complete connection configuration.
    ///
    /// No network activity happens here; a TLS request without usable
    /// certificate material fails before any connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` variants when TLS is requested and the
    /// certificate directory cannot be resolved or is incomplete.
    pub fn resolve(&self, overrides: &ConnectionOverrides) -> Result<ConnectionConfig, WorkcellError> {
        let host = self.resolve_host(overrides);

        if !(overrides.tls_verify || self.environment.tls_requested()) {
            return Ok(ConnectionConfig::plain(host));
        }

        let cert_dir = self.resolve_cert_dir(overrides)?;
        let tls = TlsMaterial::from_directory(&cert_dir)?;
        Ok(ConnectionConfig::with_tls(host, tls))
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, WorkcellError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let invalid = |reason: String| {
        WorkcellError::from(ConfigError::InvalidValue {
            field: String::from(HOME_VAR),
            reason,
        })
    };

    let resolved = std::path::absolute(path.as_std_path()).map_err(|e| invalid(e.to_string()))?;
    Utf8PathBuf::from_path_buf(resolved)
        .map_err(|p| invalid(format!("path is not valid UTF-8: {}", p.display())))
}
