//! Logging Setup
//!
//! Installs the `tracing` subscriber used by host binaries and tests. Library
//! code only emits events; it never installs a subscriber on its own.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber filtered by `RUST_LOG` (default: `warn`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    init_tracing_with_default(LevelFilter::WARN);
}

/// Same as [`init_tracing`] with an explicit default level.
pub fn init_tracing_with_default(default_level: LevelFilter) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init();
}
