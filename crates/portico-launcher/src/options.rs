//! Launcher option resolution.
//!
//! Every option resolves through the same precedence: an explicit
//! command-line flag wins over the matching `PORTICO_*` environment
//! variable, which wins over the built-in default. The variable name is
//! derived from the long flag name, upper-cased with dashes as underscores,
//! so `--server-port` reads `PORTICO_SERVER_PORT`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use thiserror::Error;

use portico_core::{ConfigurationError, PorticoOptions};

/// Prefix shared by every launcher environment variable.
const ENV_PREFIX: &str = "PORTICO_";

/// Command-line interface of the `portico` binary.
#[derive(Debug, Parser)]
#[command(name = "portico")]
#[command(about = "Boots a Portico instance from its working directory", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding the instance's configuration and state
    #[arg(short, long)]
    pub working_directory: Option<PathBuf>,

    /// Name identifying this instance in logs and response headers
    #[arg(short = 'n', long)]
    pub instance_name: Option<String>,

    /// Number of threads serving the event loops
    #[arg(long)]
    pub event_loop_pool_size: Option<usize>,

    /// Number of threads in the blocking worker pool
    #[arg(long)]
    pub worker_pool_size: Option<usize>,

    /// Join a cluster instead of running standalone
    #[arg(short, long)]
    pub clustered: bool,

    /// Port override for the HTTP server, wins over the configured port
    #[arg(short = 'p', long)]
    pub server_port: Option<u16>,
}

impl Cli {
    /// Resolves the final options, consulting `env` for every flag the
    /// command line left unset.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::InvalidEnvironment`] when a consulted
    /// variable holds a value the option cannot parse, and
    /// [`OptionsError::Configuration`] when the resolved options fail
    /// validation.
    pub fn into_options<E>(self, env: E) -> Result<PorticoOptions, OptionsError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut options = PorticoOptions::default();

        if let Some(directory) =
            resolve(self.working_directory, &env, "working-directory", "path")?
        {
            options.working_directory = directory;
        }
        if let Some(name) = resolve(self.instance_name, &env, "instance-name", "string")? {
            options.instance_name = name;
        }
        if let Some(size) = resolve(
            self.event_loop_pool_size,
            &env,
            "event-loop-pool-size",
            "thread count",
        )? {
            options.event_loop_pool_size = size;
        }
        if let Some(size) = resolve(
            self.worker_pool_size,
            &env,
            "worker-pool-size",
            "thread count",
        )? {
            options.worker_pool_size = size;
        }
        if self.clustered {
            options.clustered = true;
        } else if let Some(clustered) = resolve(None, &env, "clustered", "boolean")? {
            options.clustered = clustered;
        }
        options.server_port = resolve(self.server_port, &env, "server-port", "port number")?;

        options.validate()?;
        Ok(options)
    }
}

/// Failure while resolving launcher options.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// An environment variable held a value the option cannot parse.
    #[error("environment variable {variable} holds '{value}', expected a {expected}")]
    InvalidEnvironment {
        /// Name of the offending variable.
        variable: String,
        /// The raw value found there.
        value: String,
        /// What the option needed.
        expected: &'static str,
    },
    /// The resolved options failed validation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Reads launcher variables from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolves one option: the explicit flag value when present, otherwise the
/// parsed environment variable, otherwise nothing.
///
/// The environment is only consulted when the flag is absent, so a broken
/// variable cannot fail an invocation that overrides it.
fn resolve<T, E>(
    flag: Option<T>,
    env: &E,
    name: &str,
    expected: &'static str,
) -> Result<Option<T>, OptionsError>
where
    T: FromStr,
    E: Fn(&str) -> Option<String>,
{
    if flag.is_some() {
        return Ok(flag);
    }

    let variable = env_name(name);
    match env(&variable) {
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(OptionsError::InvalidEnvironment {
                variable,
                value,
                expected,
            }),
        },
        None => Ok(None),
    }
}

/// Derives the environment variable name for a long flag name.
fn env_name(flag: &str) -> String {
    let mut name = String::with_capacity(ENV_PREFIX.len() + flag.len());
    name.push_str(ENV_PREFIX);
    for ch in flag.chars() {
        match ch {
            '-' => name.push('_'),
            other => name.push(other.to_ascii_uppercase()),
        }
    }
    name
}
