//! Command-line argument definitions for workcell.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for workcell.
#[derive(Debug, Parser)]
#[command(name = "workcell")]
#[command(
    author,
    version,
    about = "Run single containers as ephemeral workers"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Ping the engine before running the command.
    #[arg(long, global = true)]
    pub verify_engine: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a command in a fresh container and wait for it to exit.
    Run(RunArgs),

    /// Pull an image without starting a container.
    Pull(PullArgs),

    /// Stop a container, allowing a grace period before it is killed.
    Stop(ContainerArgs),

    /// Kill a container immediately.
    Kill(ContainerArgs),

    /// Print a container's IP address.
    Inspect(ContainerArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Image reference, `repository[:tag]`.
    #[arg(required = true)]
    pub image: String,

    /// Optional container name.
    #[arg(long)]
    pub name: Option<String>,

    /// Environment entries in `KEY=VALUE` form.
    #[arg(long = "env", short = 'e')]
    pub env: Vec<String>,

    /// Forward this process's stdin into the container.
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Skip pulling the image even when configuration enables it.
    #[arg(long)]
    pub no_pull: bool,

    /// Command to run; the image default is used when omitted.
    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}

/// Arguments for the `pull` subcommand.
#[derive(Debug, Parser)]
pub struct PullArgs {
    /// Image reference, `repository[:tag]`.
    #[arg(required = true)]
    pub image: String,
}

/// Arguments for subcommands that address an existing container.
#[derive(Debug, Parser)]
pub struct ContainerArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,
}
