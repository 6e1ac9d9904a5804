//! Logging initialization helpers
//!
//! The crate itself only emits `tracing` events; embedding binaries (or
//! integration tests) call [`init_tracing`] to install a subscriber.

use tracing_subscriber::EnvFilter;

/// Install a global tracing subscriber with env-filter support.
///
/// Filter defaults to `info` and is overridable through `RUST_LOG`.
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
