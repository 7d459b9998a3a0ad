//! Structured logging.
//!
//! Uses the tracing crate; the level comes from `RUST_LOG` when set,
//! otherwise from the configured default.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Call once at startup.
pub fn init_logging(default_level: &str) {
    let fallback = format!("castlab={default_level},tower_http=warn");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
