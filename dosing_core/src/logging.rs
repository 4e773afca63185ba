//! Logging infrastructure for dosekit.
//!
//! Engine modules only emit `debug!` events; hosts decide whether to show
//! them by installing a subscriber here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `-v` count to a level: 0 warn, 1 info, 2+ debug.
///
/// The CLI prints its results on stdout, so anything chattier than warnings
/// has to be asked for with RUST_LOG or `-v`.
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Initialize logging from a `-v` count
pub fn init_verbose(verbose: u8) {
    init_with_level(level_for_verbosity(verbose))
}

/// Initialize logging with a specific default level.
///
/// RUST_LOG still wins when set. Output goes to stderr and repeated calls
/// are ignored.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Route engine events to the test harness
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
