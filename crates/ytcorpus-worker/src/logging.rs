//! Tracing initialization shared by the binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// JSON-formatted structured logging with `RUST_LOG`-style filtering,
/// defaulting to `info` for this crate's own targets.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("ytcorpus=info".parse().unwrap()))
        .init();
}
