//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Gzip level used when none is configured (best compression).
pub const DEFAULT_GZIP_LEVEL: u32 = 9;

/// Cookie carrying the session identifier.
pub const DEFAULT_SESSION_COOKIE: &str = "weblane_sessionid";

/// Body served by the default offline handler.
pub const DEFAULT_OFFLINE_TEXT: &str = "server is offline!";

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request pipeline switches (gzip, auto HEAD, offline mode).
    pub server: ServerConfig,

    /// Session binding settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Switches read by the request pipeline on every request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Compress every response body with gzip.
    pub enabled_gzip: bool,

    /// Gzip compression level (0-9).
    pub gzip_level: u32,

    /// Answer HEAD requests with the matching GET route.
    pub enabled_auto_head: bool,

    /// Route all non-WebSocket traffic to the offline handler.
    pub offline: bool,

    /// Body written by the default offline handler.
    pub offline_text: String,

    /// Redirect target for the default offline handler (takes precedence over text).
    pub offline_url: String,

    /// Directory served under `/static/` by the binary.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled_gzip: false,
            gzip_level: DEFAULT_GZIP_LEVEL,
            enabled_auto_head: true,
            offline: false,
            offline_text: DEFAULT_OFFLINE_TEXT.to_string(),
            offline_url: String::new(),
            static_dir: None,
        }
    }
}

/// Session binding configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Bind a session identifier to every request.
    pub enabled: bool,

    /// Session store name ("runtime" or "memory" for the built-in manager).
    pub store: String,

    /// Session lifetime in seconds.
    pub timeout_secs: u64,

    /// Name of the cookie carrying the session identifier.
    pub cookie_name: String,

    /// Address of a remote store, unused by the built-in manager.
    pub server_ip: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: "runtime".to_string(),
            timeout_secs: 20 * 60,
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            server_ip: String::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
