//! # Telemetry
//!
//! Installs the global tracing subscriber.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the config file sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,folio=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages (wins over `filter`)
/// - `RUST_LOG=folio::audit=info` - Audit records only
/// - Otherwise `filter`, as loaded from `[logging]`
///
/// Safe to call more than once; only the first call installs.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
