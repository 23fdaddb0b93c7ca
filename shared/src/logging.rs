//! Shared logging utilities for consistent tracing setup

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The `RUST_LOG` environment variable takes precedence; otherwise the
/// provided level (or `info`) is used. Safe to call more than once; later
/// calls are ignored, which keeps test setups simple.
pub fn init_tracing(level: Option<&str>) {
    let default_directive = level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Log service startup
pub fn log_startup(component: &str) {
    info!("🚀 {} starting", component);
}

/// Log graceful shutdown with the reason that triggered it
pub fn log_shutdown(reason: &str) {
    info!("🛑 Shutting down: {}", reason);
}

/// Log a successful major operation
pub fn log_success(message: &str) {
    info!("✅ {}", message);
}

/// Log an error with context
pub fn log_error(context: &str, error: &dyn std::error::Error) {
    error!("❌ {}: {}", context, error);
}
