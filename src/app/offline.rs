//! Maintenance-mode responses.

use axum::extract::Request;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ServerConfig;
use crate::http::context::TEXT_PLAIN_UTF8;

/// Answers every request while the server is flagged offline.
pub trait OfflineHandler: Send + Sync {
    fn serve(&self, request: &Request, config: &ServerConfig) -> Response;
}

/// Redirects to `offline_url` when one is configured, otherwise answers
/// `503` with `offline_text`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultOfflineServer;

impl OfflineHandler for DefaultOfflineServer {
    fn serve(&self, _request: &Request, config: &ServerConfig) -> Response {
        if !config.offline_url.is_empty() {
            if let Ok(location) = HeaderValue::from_str(&config.offline_url) {
                return (StatusCode::FOUND, [(LOCATION, location)]).into_response();
            }
            tracing::warn!(url = %config.offline_url, "offline url is not a valid header value");
        }
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8))],
            config.offline_text.clone(),
        )
            .into_response()
    }
}

impl<F> OfflineHandler for F
where
    F: Fn(&Request, &ServerConfig) -> Response + Send + Sync,
{
    fn serve(&self, request: &Request, config: &ServerConfig) -> Response {
        self(request, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> Request {
        Request::new(Body::empty())
    }

    #[test]
    fn answers_503_with_text() {
        let config = ServerConfig {
            offline_text: "maintenance".into(),
            ..ServerConfig::default()
        };
        let response = DefaultOfflineServer.serve(&request(), &config);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN_UTF8);
    }

    #[test]
    fn redirects_when_url_is_set() {
        let config = ServerConfig {
            offline_url: "https://status.example.com".into(),
            ..ServerConfig::default()
        };
        let response = DefaultOfflineServer.serve(&request(), &config);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "https://status.example.com");
    }
}
