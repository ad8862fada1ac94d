//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (gzip level, addresses)
//! - Reject settings the pipeline cannot honor (cookie names, offline URLs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WebConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderValue, Uri};
use thiserror::Error;

use crate::config::schema::WebConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("server.gzip_level: {0} is outside 0-9")]
    GzipLevel(u32),

    #[error("server.offline_url: `{0}` is not a valid URI")]
    OfflineUrl(String),

    #[error("session.cookie_name: `{0}` is not a valid cookie name")]
    CookieName(String),

    #[error("observability.log_level: unknown level `{0}`")]
    LogLevel(String),

    #[error("admin.api_key: must not be empty when admin is enabled")]
    EmptyApiKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WebConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);

    if config.server.gzip_level > 9 {
        errors.push(ValidationError::GzipLevel(config.server.gzip_level));
    }

    let offline_url = &config.server.offline_url;
    if !offline_url.is_empty()
        && (offline_url.parse::<Uri>().is_err() || HeaderValue::from_str(offline_url).is_err())
    {
        errors.push(ValidationError::OfflineUrl(offline_url.clone()));
    }

    if !is_cookie_token(&config.session.cookie_name) {
        errors.push(ValidationError::CookieName(config.session.cookie_name.clone()));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

// RFC 6265 token: visible ASCII minus separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"'
                        | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}'
                )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&WebConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = WebConfig::default();
        config.listener.bind_address = "not an address".into();
        config.server.gzip_level = 12;
        config.session.cookie_name = "bad name".into();
        config.observability.log_level = "loud".into();
        config.admin.enabled = true;
        config.admin.api_key.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::GzipLevel(12)));
        assert!(errors.contains(&ValidationError::EmptyApiKey));
    }

    #[test]
    fn offline_url_must_be_a_header_safe_uri() {
        let mut config = WebConfig::default();
        config.server.offline_url = "/maintenance.html".into();
        assert!(validate_config(&config).is_ok());

        config.server.offline_url = "http://exa mple.com".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::OfflineUrl("http://exa mple.com".into())])
        );
    }
}
