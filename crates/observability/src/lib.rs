//! Process-wide tracing setup shared by the binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

/// Initialize process-wide tracing.
///
/// `level` is the default filter directive; `RUST_LOG` overrides it. Safe to
/// call multiple times; later calls are no-ops.
pub fn init(level: &str, json: bool) {
    tracing::init(level, json);
}
