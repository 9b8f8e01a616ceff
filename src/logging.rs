//! Diagnostic output for the binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor `--verbose` says otherwise.
pub const DEFAULT_FILTER: &str = "info";

/// The filter for a given `-v` count. Zero defers to `RUST_LOG`.
pub fn filter_for(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Colors only when stderr is a terminal and `NO_COLOR` is unset. Calling
/// this twice is harmless; the second call is ignored.
pub fn init(verbosity: u8) {
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let _ = tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(filter_for(verbosity))
        .with_writer(std::io::stderr)
        .try_init();
}
