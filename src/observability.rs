//! Tracing setup helpers.
//!
//! The engine itself only emits `tracing` spans and events; these helpers
//! wire up a subscriber for binaries and examples that don't bring their
//! own.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing with sensible defaults.
///
/// Console output with timestamps, filtered by `RUST_LOG` when set.
pub fn init_tracing() {
    init_tracing_with_filter("tandem=info");
}

/// Initialize tracing with a custom fallback filter string, e.g.
/// `"tandem=debug"`. `RUST_LOG` still takes precedence when set.
pub fn init_tracing_with_filter(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let fmt_layer = fmt::layer().with_target(true).with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
