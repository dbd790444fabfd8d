//! Operator-facing logging to stderr.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: iteration banners, warnings, and fatal
//!   errors via `RUST_LOG`, output to stderr. Not persisted.
//!
//! - **Run records (`io/iteration_log`)**: product artifacts under
//!   `.planloop/runs/`. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` when set; otherwise defaults to `info`, raised to
/// `debug` when the session is verbose (`-v`). Output: stderr, compact
/// format.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
