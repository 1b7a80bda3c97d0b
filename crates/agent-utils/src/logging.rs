//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize a human-readable tracing subscriber
///
/// `RUST_LOG` wins over `default_directive` when set. Calling this twice is a
/// no-op for the second call.
pub fn init_tracing(default_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize a tracing subscriber that emits one JSON object per event
pub fn init_json_tracing(default_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init();
}
