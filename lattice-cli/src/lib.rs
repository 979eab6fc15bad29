#![forbid(unsafe_code)]

//! Shared setup for the three LATTICE binaries (spec §6). Kept as a
//! small library crate so `lattice-client`, `lattice-server`, and
//! `lattice-analyze` don't each reimplement tracing init.

/// Install the global `tracing` subscriber, gated by `RUST_LOG` with
/// `info` as the default level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
