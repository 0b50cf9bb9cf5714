//! Tracing subscriber setup.

use tracing_subscriber::filter::EnvFilter;

/// Environment variable holding the log filter, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "UARTBRIDGE_LOG";

/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "info";

/// Build the log filter.
///
/// An explicit directive (the `--log-level` flag) wins, then
/// `UARTBRIDGE_LOG`, then `RUST_LOG`, then [`DEFAULT_FILTER`]. An invalid
/// directive falls back to the default with a message on stderr.
pub fn build_filter(directive: Option<&str>) -> EnvFilter {
    let directive = directive
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok());

    match directive {
        Some(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid log filter {:?} ({}); defaulting to {}",
                directive, err, DEFAULT_FILTER
            );
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Stdout is left free for command output. Calling this twice is harmless.
pub fn init_tracing(directive: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
