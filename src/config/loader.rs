//! Configuration loading with layered precedence.
//!
//! Layers are composed manually with `MergeComposer` (lowest to highest):
//! application defaults, configuration file, environment variables,
//! command-line arguments. The `Cli` struct owns subcommand dispatch, so
//! `OrthoConfig::load()` cannot parse the command line itself.
//!
//! # Environment Variable Handling
//!
//! Typed variables fail fast: `WORKCELL_TLS_VERIFY=maybe` is an error rather
//! than a silent fallback to the default. String fields such as
//! `WORKCELL_ENGINE_SOCKET` are always accepted.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::{DefaultEnv, Env};
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// Environment variable naming an explicit configuration file.
const CONFIG_PATH_VAR: &str = "WORKCELL_CONFIG_PATH";

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Boolean value (`true`/`false`).
    Bool,
    /// Unsigned 64-bit integer.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "WORKCELL_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "WORKCELL_VERIFY_ENGINE",
        path: &["verify_engine"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "WORKCELL_TLS_VERIFY",
        path: &["tls", "verify"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "WORKCELL_TLS_CERT_PATH",
        path: &["tls", "cert_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "WORKCELL_LAUNCH_PULL",
        path: &["launch", "pull"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "WORKCELL_LAUNCH_REMOVE_ON_START_FAILURE",
        path: &["launch", "remove_on_start_failure"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "WORKCELL_LAUNCH_WAIT_TIMEOUT_SECS",
        path: &["launch", "wait_timeout_secs"],
        var_type: EnvVarType::U64,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `WORKCELL_*` variable without keeping a
/// second hard-coded list in sync.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a TOML configuration file through `cap_std` and push it as the file
/// layer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Pick the configuration file: an explicit `--config` path must exist,
/// otherwise discovery candidates are tried in order.
fn select_config_file<E: Env>(cli: &Cli, env: &E) -> Result<Option<Utf8PathBuf>> {
    if let Some(ref path) = cli.config {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.clone().into_std_path_buf(),
            }
            .into());
        }
        return Ok(Some(path.clone()));
    }

    if let Some(explicit) = env
        .string(CONFIG_PATH_VAR)
        .filter(|value| !value.is_empty())
        .map(Utf8PathBuf::from)
        .filter(|candidate| candidate.exists())
    {
        return Ok(Some(explicit));
    }

    let discovery = ConfigDiscovery::builder("workcell")
        .env_var(CONFIG_PATH_VAR)
        .config_file_name("config.toml")
        .dotfile_name(".workcell.toml")
        .build();

    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|candidate| candidate.exists())
        .find_map(|candidate| Utf8PathBuf::try_from(candidate).ok()))
}

/// Load configuration from the process environment with full layer
/// precedence.
///
/// 1. Application defaults defined in the struct
/// 2. Configuration file (`--config`, `WORKCELL_CONFIG_PATH` or discovery)
/// 3. Environment variables prefixed with `WORKCELL_`
/// 4. Command-line arguments (from the provided `Cli`)
///
/// # Errors
///
/// Returns `ConfigError` if configuration loading fails due to:
/// - An explicit `--config` path that does not exist
/// - Malformed configuration files
/// - Invalid typed environment variable values
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &DefaultEnv::new())
}

/// Load configuration reading environment variables from `env`.
///
/// # Errors
///
/// Returns the same errors as [`load_config`].
pub fn load_config_with_env<E: Env>(cli: &Cli, env: &E) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(ref path) = select_config_file(cli, env)? {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;

    Ok(config)
}

/// Collect `WORKCELL_*` variables into a JSON value shaped like `AppConfig`.
///
/// Empty values are treated as unset.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed variable has an unparseable
/// value.
fn collect_env_vars<E: Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var).filter(|value| !value.is_empty()) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::Bool => Value::Bool(raw_value.parse::<bool>().map_err(|_| {
                invalid_env_value(spec, format!("expected bool (true/false), got '{raw_value}'"))
            })?),
            EnvVarType::U64 => Value::Number(
                raw_value
                    .parse::<u64>()
                    .map_err(|_| {
                        invalid_env_value(
                            spec,
                            format!("expected unsigned integer, got '{raw_value}'"),
                        )
                    })?
                    .into(),
            ),
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn invalid_env_value(spec: &EnvVarSpec, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: spec.env_var.to_owned(),
        reason,
    }
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref socket) = cli.engine_socket {
        overrides.insert("engine_socket".to_owned(), Value::String(socket.clone()));
    }

    if cli.verify_engine {
        overrides.insert("verify_engine".to_owned(), Value::Bool(true));
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
