//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if set and valid, `level` otherwise.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(level: &str, json: bool) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
