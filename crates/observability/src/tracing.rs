//! Tracing/logging initialization.
//!
//! Sweeps run as short-lived invocations, so every line the process emits
//! has to be machine-parseable from the first instant: JSON output, level
//! filtering via `RUST_LOG`, and an `info` floor when the variable is unset.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops), so tests and
/// embedding binaries can call it unconditionally.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
