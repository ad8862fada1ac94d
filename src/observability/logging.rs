//! Structured logging.
//!
//! # Design Decisions
//! - `tracing` everywhere; the subscriber is installed once by the binary
//! - Pretty format for development, JSON for production
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ObservabilityConfig};

/// Target of fault records (JSON error lines).
pub const LOG_TARGET_HTTP_SERVER: &str = "http_server";
/// Target of access-log lines.
pub const LOG_TARGET_HTTP_REQUEST: &str = "http_request";

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

fn default_directives(level: &str) -> String {
    format!("{level},tower_http={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse() {
        let directives = default_directives("debug");
        assert_eq!(directives, "debug,tower_http=debug");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
