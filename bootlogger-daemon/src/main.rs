use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use bootlogger_core::SessionMode;
use bootlogger_core::metrics as core_metrics;
use bootlogger_daemon::cli::DaemonCli;
use bootlogger_daemon::logging::init_tracing;
use bootlogger_daemon::{GetpropReader, Session};

/// Grace period for blocking reads left behind on exit.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("bootlogger-daemon: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A file source read parked in the blocking pool cannot be interrupted.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "bootlogger-daemon failed");
            eprintln!("bootlogger-daemon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: DaemonCli) -> Result<()> {
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    init_tracing(&config.general)?;
    core_metrics::describe_all();

    let mode = if cli.system {
        SessionMode::System
    } else {
        SessionMode::from_env()
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = mode.subdir(),
        "bootlogger-daemon starting"
    );

    let properties = Arc::new(GetpropReader::new(&config.wait.getprop_path));
    Session::new(config, mode, &cli.log_dir, properties)
        .run()
        .await?;

    tracing::info!("bootlogger-daemon shut down");
    Ok(())
}
