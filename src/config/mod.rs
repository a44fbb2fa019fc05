//! Configuration system for workcell.
//!
//! This module provides the configuration structures and CLI definitions for
//! the workcell binary. Layers are merged with the `ortho_config` crate. CLI
//! flags override environment variables, which override configuration files,
//! which override defaults.
//!
//! The configuration file is expected at `~/.config/workcell/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/docker.sock"
//!
//! [tls]
//! verify = true
//! cert_path = "/etc/workcell/certs"
//!
//! [launch]
//! pull = true
//! remove_on_start_failure = true
//! wait_timeout_secs = 600
//! ```

mod cli;
mod loader;
mod types;


pub use cli::{Cli, Commands, ContainerArgs, PullArgs, RunArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{AppConfig, LaunchConfig, TlsConfig};
