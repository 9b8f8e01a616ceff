//! Leasekeeper operator CLI.
//!
//! Parses arguments, initialises logging, dispatches to the command handler,
//! and maps errors to exit codes.

mod cli;
mod commands;

use cli::Cli;
use leasekeeper::{exit_codes, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            ExitCode::from(err.exit_code() as u8)
        }
    }
}
