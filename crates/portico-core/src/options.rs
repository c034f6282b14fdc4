//! Process-level options.
//!
//! [`PorticoOptions`] carries the validated, process-wide settings a boot
//! attempt runs under. The launcher fills it from command-line flags and
//! environment variables; embedders construct it directly.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::ConfigurationError;

/// Default working directory, relative to the process working directory.
const DEFAULT_WORKING_DIRECTORY: &str = "./working_dir/";

/// Default number of blocking worker threads.
const DEFAULT_WORKER_POOL_SIZE: usize = 20;

/// Process-level options for one Portico instance.
///
/// All fields are plain data; call [`PorticoOptions::validate`] before
/// handing the options to a boot attempt.
///
/// # Example
///
/// ```
/// use portico_core::PorticoOptions;
///
/// let mut options = PorticoOptions::default();
/// options.server_port = Some(0);
/// options.validate().expect("defaults are valid");
/// assert!(options.instance_name.starts_with("portico-"));
/// ```
#[derive(Debug, Clone)]
pub struct PorticoOptions {
    /// Name identifying this instance in logs and response headers.
    pub instance_name: String,
    /// Directory holding the instance's configuration and state.
    pub working_directory: PathBuf,
    /// Number of threads serving the event loops.
    pub event_loop_pool_size: usize,
    /// Number of threads in the blocking worker pool.
    pub worker_pool_size: usize,
    /// Whether this instance should join a cluster.
    pub clustered: bool,
    /// Port override for the HTTP server; wins over the configured port.
    pub server_port: Option<u16>,
}

impl PorticoOptions {
    /// Creates options with all defaults, including a generated instance name.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance_name: generate_instance_name(),
            working_directory: PathBuf::from(DEFAULT_WORKING_DIRECTORY),
            event_loop_pool_size: default_event_loop_pool_size(),
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            clustered: false,
            server_port: None,
        }
    }

    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] when a pool size is zero
    /// or the instance name is empty.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.event_loop_pool_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "event_loop_pool_size",
                "must be at least 1",
            ));
        }
        if self.worker_pool_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "worker_pool_size",
                "must be at least 1",
            ));
        }
        if self.instance_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "instance_name",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Returns the directory holding configuration files:
    /// `<working_directory>/config`.
    #[must_use]
    pub fn config_directory(&self) -> PathBuf {
        self.working_directory.join("config")
    }

    /// Returns the working directory as an absolute path, resolving relative
    /// paths against the current process directory.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while reading the current directory.
    pub fn absolute_working_directory(&self) -> std::io::Result<PathBuf> {
        absolute_path(&self.working_directory)
    }
}

impl Default for PorticoOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a unique instance name of the form `portico-<uuid>`.
fn generate_instance_name() -> String {
    format!("portico-{}", Uuid::now_v7())
}

fn default_event_loop_pool_size() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
