//! Structured logging setup using `tracing-subscriber`.
//!
//! Console-only: the tracker's diagnostics are line-oriented events on
//! stderr, with the level filter taken from configuration and overridable via
//! `RUST_LOG`. Set the filter to `debug` for per-event detail, or `trace`
//! for per-byte translation detail.

use tracing_subscriber::EnvFilter;

/// Initialise logging to stderr.
///
/// `default_level` comes from configuration; the `RUST_LOG` environment
/// variable takes precedence when set.
pub fn init(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
