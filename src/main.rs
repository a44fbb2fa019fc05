//! `workcell` application entry point.
//!
//! The binary runs single containers as ephemeral workers. It uses `eyre` for
//! opaque error handling at the application boundary, converting the
//! library's semantic errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/workcell/config.toml` or path from
//!    `WORKCELL_CONFIG_PATH`)
//! 3. Environment variables (`WORKCELL_*`)
//! 4. Command-line arguments

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use mockable::DefaultEnv;
use tracing_subscriber::EnvFilter;
use workcell::api::{self, CommandOutcome, RunParams};
use workcell::config::{AppConfig, Cli, Commands, RunArgs, load_config};
use workcell::engine::{
    AttachSettings, Cancellation, ImageReference, LaunchRequest, StartFailurePolicy,
};
use workcell::error::{ContainerError, Result as WorkcellResult};

/// Application entry point.
///
/// Parses the CLI, loads layered configuration, installs logging on stderr
/// and dispatches the subcommand. `run` exits with the container's exit code.
fn main() -> EyreResult<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let outcome = run(&cli, &config).map_err(Report::from)?;
    Ok(exit_code_for(outcome))
}

/// Execute the CLI command, returning domain-specific errors.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`.
fn run(cli: &Cli, config: &AppConfig) -> WorkcellResult<CommandOutcome> {
    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| ContainerError::RuntimeCreationFailed {
            message: e.to_string(),
        })?;
    let handle = runtime.handle();
    let docker = api::connect(handle, config, &DefaultEnv::new())?;

    match &cli.command {
        Commands::Run(args) => run_worker(handle, &docker, config, args),
        Commands::Pull(args) => api::pull_image(handle, &docker, &args.image),
        Commands::Stop(args) => api::stop_container(handle, &docker, &args.container),
        Commands::Kill(args) => api::kill_container(handle, &docker, &args.container),
        Commands::Inspect(args) => {
            let address = api::inspect_address(handle, &docker, &args.container)?;
            print_address(&address);
            Ok(CommandOutcome::Success)
        }
    }
}

/// Pull, create, start and wait for a worker container, streaming its
/// output to this process's stdout.
fn run_worker(
    runtime: &tokio::runtime::Handle,
    docker: &bollard::Docker,
    config: &AppConfig,
    args: &RunArgs,
) -> WorkcellResult<CommandOutcome> {
    let attach = if args.interactive {
        AttachSettings::WORKER
    } else {
        AttachSettings {
            stdin: false,
            open_stdin: false,
            stdin_once: false,
            ..AttachSettings::WORKER
        }
    };
    let image = ImageReference::parse(&args.image)?;
    let mut request = LaunchRequest::new(image, args.command.clone())
        .with_env(Some(args.env.clone()))
        .with_attach(attach)
        .with_start_failure_policy(StartFailurePolicy::from_remove_flag(
            config.launch.remove_on_start_failure,
        ));
    if let Some(ref name) = args.name {
        request = request.with_name(name.as_str());
    }

    let cancellation = config
        .launch
        .wait_timeout_secs
        .map_or_else(Cancellation::default, |secs| {
            Cancellation::default().with_deadline(Duration::from_secs(secs))
        });

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    api::run_container(
        runtime,
        docker,
        RunParams {
            request,
            pull: config.launch.pull && !args.no_pull,
            stdin: args.interactive.then_some(&mut stdin),
            output: &mut stdout,
            cancellation,
        },
    )
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_address(address: &str) {
    println!("{address}");
}

/// Map a command outcome to the process exit code. Codes outside `u8`
/// collapse to 255.
fn exit_code_for(outcome: CommandOutcome) -> ExitCode {
    match outcome {
        CommandOutcome::Success => ExitCode::SUCCESS,
        CommandOutcome::CommandExit { code } => {
            ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
        }
    }
}
