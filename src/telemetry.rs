//! Subscriber setup for binaries embedding the client
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host. This helper covers the common case.

use tracing_subscriber::EnvFilter;

use crate::error::ApiError;

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info`, or `debug` for this crate when `debug` is set.
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(debug: bool) -> Result<(), ApiError> {
    let default_filter = if debug {
        "info,appointments_api=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|err| ApiError::from_string(format!("failed to initialise tracing subscriber: {err}")))
}
