use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use log::error;

use server_supervisor::app::{cli, console_observer::ConsoleObserver, logging};
use server_supervisor::{ServerSupervisor, SupervisorConfig};

#[derive(Debug, Parser)]
#[command(name = "server_supervisor", about = "Run and supervise a local server process")]
struct Args {
    /// Directory holding the server binary and its config file.
    #[arg(long, env = "SUPERVISOR_RESOURCE_DIR", default_value = ".")]
    resource_dir: PathBuf,

    /// Server binary file name inside the resource directory.
    #[arg(long, env = "SUPERVISOR_BINARY", default_value = "cli-proxy-api")]
    binary: String,

    /// Config file passed as `--config`; defaults to config.yaml in the
    /// resource directory.
    #[arg(long, env = "SUPERVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Diagnostic log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(&args.log_level);

    let mut config = SupervisorConfig::from_resource_dir(&args.resource_dir, &args.binary);
    if let Some(path) = args.config {
        config.config_path = path;
    }

    let observer = Arc::new(ConsoleObserver::new());
    let supervisor = ServerSupervisor::new(config, observer.clone());

    match cli::run_cli(supervisor, observer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Console failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
