//! rolecall - prefix command bot with admin permissions, text commands and role commands.

use clap::Parser;
use std::process::ExitCode;

use rolecall::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Commands::parse();

    // Keep the guard so buffered log lines are flushed on exit
    let _log_guard = match logging::init(args.log_dir.as_deref()) {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
