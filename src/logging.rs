//! Tracing subscriber installation

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to info with crate-level debug.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scribe_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
