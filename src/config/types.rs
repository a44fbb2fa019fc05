//! Configuration data types for workcell.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

/// Transport security settings for the engine connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Force TLS even when `DOCKER_TLS_VERIFY` is unset.
    pub verify: bool,

    /// Directory holding `cert.pem`, `key.pem` and `ca.pem`.
    ///
    /// Takes precedence over `DOCKER_CERT_PATH` and `$HOME/.docker`.
    pub cert_path: Option<Utf8PathBuf>,
}

/// Defaults applied when launching a worker container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Pull the image before creating the container.
    pub pull: bool,

    /// Force-remove a container whose start request was rejected.
    pub remove_on_start_failure: bool,

    /// Upper bound on how long `run` waits for the container, in seconds.
    pub wait_timeout_secs: Option<u64>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            pull: true,
            remove_on_start_failure: false,
            wait_timeout_secs: None,
        }
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `WORKCELL_CONFIG_PATH` environment variable
/// 2. `.workcell.toml` in the current working directory
/// 3. `.workcell.toml` in the home directory
/// 4. `~/.config/workcell/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "WORKCELL",
    post_merge_hook,
    discovery(
        app_name = "workcell",
        env_var = "WORKCELL_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".workcell.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// Ping the engine after connecting and fail early when it does not
    /// answer.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub verify_engine: bool,

    /// Transport security configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub tls: TlsConfig,

    /// Launch defaults.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub launch: LaunchConfig,
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // A blank socket means "not configured" so DOCKER_HOST still applies.
        if self
            .engine_socket
            .as_deref()
            .is_some_and(|socket| socket.trim().is_empty())
        {
            self.engine_socket = None;
        }
        if self
            .tls
            .cert_path
            .as_ref()
            .is_some_and(|path| path.as_str().is_empty())
        {
            self.tls.cert_path = None;
        }
        Ok(())
    }
}
