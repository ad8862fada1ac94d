//! Single entry point for every inbound request.
//!
//! ```text
//! request
//!     → Connection: upgrade? → websocket routes
//!                                └─ no match → normal dispatch
//!     → offline?             → offline handler
//!     → http routes
//! response ← Server: weblane
//! ```

use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::{CONNECTION, SERVER};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use crate::app::ServerCore;

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "weblane";

/// Offline check, then the HTTP routes.
#[derive(Clone)]
pub(crate) struct NormalDispatch {
    core: Arc<ServerCore>,
    http: Router,
}

impl NormalDispatch {
    pub(crate) fn new(core: Arc<ServerCore>, http: Router) -> Self {
        Self { core, http }
    }

    pub(crate) async fn dispatch(&self, request: Request) -> Response {
        let config = self.core.config();
        if config.server.offline {
            return self.core.offline_handler().serve(&request, &config.server);
        }
        route(&self.http, request).await
    }
}

pub(crate) struct FrontDoor {
    normal: NormalDispatch,
    websocket: Router,
}

impl FrontDoor {
    /// `websocket` should fall back to `normal` for unmatched upgrades.
    pub(crate) fn new(normal: NormalDispatch, websocket: Router) -> Self {
        Self { normal, websocket }
    }

    pub(crate) async fn dispatch(&self, request: Request) -> Response {
        let mut response = if is_websocket_request(request.headers()) {
            route(&self.websocket, request).await
        } else {
            self.normal.dispatch(request).await
        };
        response
            .headers_mut()
            .entry(SERVER)
            .or_insert(HeaderValue::from_static(SERVER_NAME));
        response
    }
}

async fn route(router: &Router, request: Request) -> Response {
    match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Whether any `Connection` header carries the `upgrade` token.
pub fn is_websocket_request(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_upgrade_token() {
        let mut headers = HeaderMap::new();
        assert!(!is_websocket_request(&headers));

        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(is_websocket_request(&headers));

        headers.insert(CONNECTION, HeaderValue::from_static("upgraded-ish"));
        assert!(!is_websocket_request(&headers));
    }
}
