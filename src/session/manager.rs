//! Session identifier issuing and lookup.

use axum::http::{header, HeaderMap};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionConfig;

/// Characters left unescaped in cookie values (URL query escaping).
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Store names served by [`CookieSessionManager`].
const BUILTIN_STORES: [&str; 2] = ["runtime", "memory"];

/// Errors raised while creating a manager or reading a client's session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unsupported session store `{0}`")]
    UnsupportedStore(String),

    #[error("session cookie is not valid UTF-8 after unescaping")]
    InvalidCookie,
}

/// Issues and resolves session identifiers. Session data lives elsewhere.
pub trait SessionManager: Send + Sync {
    /// Name of the cookie carrying the identifier.
    fn cookie_name(&self) -> &str;

    /// Identifier presented by the client, if any.
    fn client_session_id(&self, headers: &HeaderMap) -> Result<Option<String>, SessionError>;

    /// Mint a fresh identifier.
    fn new_session_id(&self) -> String;
}

/// Manager backed by a plain cookie and random identifiers.
#[derive(Debug, Clone)]
pub struct CookieSessionManager {
    cookie_name: String,
    timeout_secs: u64,
}

impl CookieSessionManager {
    /// Build a manager for the configured store.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let store = config.store.to_ascii_lowercase();
        if !BUILTIN_STORES.contains(&store.as_str()) {
            return Err(SessionError::UnsupportedStore(config.store.clone()));
        }
        Ok(Self {
            cookie_name: config.cookie_name.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

impl SessionManager for CookieSessionManager {
    fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn client_session_id(&self, headers: &HeaderMap) -> Result<Option<String>, SessionError> {
        match find_cookie(headers, &self.cookie_name) {
            Some(raw) => unescape(raw).map(Some),
            None => Ok(None),
        }
    }

    fn new_session_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Escape an identifier for use as a cookie value.
pub fn escape(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_VALUE).to_string()
}

fn unescape(value: &str) -> Result<String, SessionError> {
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(|_| SessionError::InvalidCookie)
}

/// First value of the named cookie across all `Cookie` headers.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager() -> CookieSessionManager {
        CookieSessionManager::from_config(&SessionConfig::default()).unwrap()
    }

    #[test]
    fn unknown_store_fails() {
        let config = SessionConfig {
            store: "redis".into(),
            ..SessionConfig::default()
        };
        let err = CookieSessionManager::from_config(&config).unwrap_err();
        assert_eq!(err.to_string(), "unsupported session store `redis`");
    }

    #[test]
    fn finds_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; weblane_sessionid=abc%20123; lang=en"),
        );
        let id = manager().client_session_id(&headers).unwrap();
        assert_eq!(id.as_deref(), Some("abc 123"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(manager().client_session_id(&headers).unwrap().is_none());
    }

    #[test]
    fn new_ids_are_unique_hex() {
        let m = manager();
        let a = m.new_session_id();
        let b = m.new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn escape_round_trips() {
        let escaped = escape("a b/c");
        assert_eq!(escaped, "a%20b%2Fc");
        assert_eq!(unescape(&escaped).unwrap(), "a b/c");
    }
}
