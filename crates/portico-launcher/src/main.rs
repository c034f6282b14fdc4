//! Portico launcher - entry point.
//!
//! Resolves process options from flags and environment, builds the tokio
//! runtime sized by those options, and boots a [`Portico`] instance that
//! serves until interrupted.

mod options;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portico_core::{PorticoOptions, ShutdownSignal};
use portico_server::Portico;

use crate::options::{process_env, Cli};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version land on stdout and exit cleanly; genuine
            // argument errors report on stderr and fail.
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return code;
        }
    };

    init_tracing();

    let options = match cli.into_options(process_env) {
        Ok(options) => options,
        Err(err) => {
            error!(error = %err, "invalid launcher options");
            eprintln!("Invalid options: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(options.event_loop_pool_size)
        .max_blocking_threads(options.worker_pool_size)
        .thread_name("portico-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build the tokio runtime");
            eprintln!("Failed to build the tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(options))
}

/// Boots the instance and serves until SIGTERM or SIGINT.
///
/// Boot failures are reported on stderr and in the error log; they end the
/// process without selecting a failure exit code.
async fn run(options: PorticoOptions) -> ExitCode {
    info!(
        instance = %options.instance_name,
        working_directory = %options.working_directory.display(),
        "starting portico"
    );

    let mut portico = match Portico::start(options).await {
        Ok(portico) => portico,
        Err(err) => {
            error!(error = %err, "portico failed to start");
            eprintln!("Failed to start portico: {err}");
            return ExitCode::SUCCESS;
        }
    };

    ShutdownSignal::from_os_signals().recv().await;

    if let Err(err) = portico.stop().await {
        error!(error = %err, "runtime did not close cleanly");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "portico_launcher=info,portico_server=info,portico_config=info,portico_core=info,warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
