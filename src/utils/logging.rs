//! Logging initialization for the host
//!
//! - Respects RUST_LOG (always takes precedence)
//! - Falls back to the config filter, then to "info"
//! - Respects NO_COLOR
//! - Writes to stderr; stdout belongs to command output
//!
//! # Usage
//! ```rust,no_run
//! use arcade_host::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the env filter: RUST_LOG, then the given filter, then "info"
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging
///
/// # Arguments
/// * `filter` - Optional log filter from config or CLI (e.g. "debug",
///              "arcade_host::module=trace"). Ignored when RUST_LOG is set.
///
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output (for log aggregation)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging from `LoggingConfig`
///
/// Falls back to human-readable output when JSON is requested but the
/// `json-logging` feature is disabled.
pub fn init_logging_from_config(config: &LoggingConfig) {
    let filter = config.filter.as_deref();

    if config.json_format {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
            return;
        }
        #[cfg(not(feature = "json-logging"))]
        {
            tracing::debug!("json-logging feature disabled, using text output");
        }
    }
    init_logging(filter);
}
