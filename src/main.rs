//! Debug server CLI
//!
//! Starts programs under a remote debug client, or waits for externally
//! started clients, and drives the session from an interactive console.

use std::path::PathBuf;

use clap::Parser;
use debug_server::cli::{self, GlobalOptions};
use debug_server::commands::Commands;
use debug_server::common::{logging, paths};

#[derive(Parser)]
#[command(name = "debug-server", about = "Remote debugger session manager")]
#[command(version, long_about = None)]
struct Cli {
    /// Print session events as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Also write a detailed log, to DIR or the default log directory
    #[arg(long, global = true, value_name = "DIR", num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    /// Configuration file to use instead of the default one
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_dir = cli
        .log_file
        .clone()
        .map(|dir| dir.or_else(paths::log_dir).unwrap_or_else(|| PathBuf::from(".")));
    let _guard = match &log_dir {
        Some(dir) => match logging::init_file(dir) {
            Ok((path, guard)) => {
                tracing::info!(path = %path.display(), "Logging to file");
                Some(guard)
            }
            Err(e) => {
                eprintln!("Error: cannot open log directory {}: {e}", dir.display());
                std::process::exit(1);
            }
        },
        None => {
            logging::init_cli();
            None
        }
    };

    let options = GlobalOptions {
        json: cli.json,
        config: cli.config,
    };

    if let Err(e) = cli::dispatch(cli.command, options).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
