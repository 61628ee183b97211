//! Process-wide tracing setup

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber: compact stderr output, filtered
/// by `RUST_LOG` when set, `info` otherwise. Call once at startup.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
