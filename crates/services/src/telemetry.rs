use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `fmt` subscriber filtered by `filter` (a `RUST_LOG`-style directive).
///
/// Returns `false` if a subscriber was already installed, which is harmless in tests.
pub fn init_tracing(filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt::layer())
        .try_init()
        .is_ok()
}
