//! Palaver - turn-based chat between you, a shell, and a local model.

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod config;
mod core;
mod error;
mod logging;
mod presenter;
mod protocol;
mod providers;
mod shell;

use cli::Commands;

#[tokio::main]
async fn main() -> ExitCode {
    // The guard flushes the log file on drop; it must outlive the session.
    let _guard = match logging::init() {
        Ok((guard, _log_dir)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
