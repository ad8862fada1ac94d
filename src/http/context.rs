//! Per-request context handed to handlers and hooks.
//!
//! Contexts are pooled. The pipeline resets every field before a request and
//! recycles the context after the last hook returns, so nothing read from a
//! context may be kept beyond the handler call.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{self, HeaderName};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, Version};
use bytes::Bytes;
use serde::Serialize;

use crate::app::ServerCore;
use crate::config::WebConfig;
use crate::http::fault::{HandlerError, HandlerResult};
use crate::http::hijack::{HijackError, HijackedConn};
use crate::http::response::{Cookie, ResponseSink};
use crate::http::websocket::WebSocket;
use crate::pool::{Pooled, Recycle};

/// `Content-Type` of plain-text responses.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// `Content-Type` of JSON responses.
pub const APPLICATION_JSON_UTF8: &str = "application/json; charset=utf-8";

/// The unit of work for one request (or one WebSocket connection).
pub struct HttpContext {
    request: Parts,
    body: Option<Body>,
    remote_addr: Option<SocketAddr>,
    response: Option<Pooled<ResponseSink>>,
    session_id: String,
    params: Vec<(String, String)>,
    websocket: Option<WebSocket>,
    is_websocket: bool,
    hijacked: Option<HijackedConn>,
    ended: bool,
    items: Extensions,
    server: Option<Arc<ServerCore>>,
}

fn empty_parts() -> Parts {
    Request::new(()).into_parts().0
}

impl Default for HttpContext {
    fn default() -> Self {
        Self {
            request: empty_parts(),
            body: None,
            remote_addr: None,
            response: None,
            session_id: String::new(),
            params: Vec::new(),
            websocket: None,
            is_websocket: false,
            hijacked: None,
            ended: false,
            items: Extensions::new(),
            server: None,
        }
    }
}

impl HttpContext {
    /// Bind the context to a new request. Every field is overwritten.
    pub(crate) fn reset(
        &mut self,
        request: Parts,
        body: Body,
        remote_addr: Option<SocketAddr>,
        response: Option<Pooled<ResponseSink>>,
        server: Arc<ServerCore>,
    ) {
        self.request = request;
        self.body = Some(body);
        self.remote_addr = remote_addr;
        self.response = response;
        self.session_id.clear();
        self.params.clear();
        self.websocket = None;
        self.is_websocket = false;
        self.hijacked = None;
        self.ended = false;
        self.items.clear();
        self.server = Some(server);
    }

    pub(crate) fn set_params<'a>(&mut self, params: impl IntoIterator<Item = (&'a str, &'a str)>) {
        self.params.clear();
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
    }

    pub(crate) fn attach_websocket(&mut self, websocket: WebSocket) {
        self.websocket = Some(websocket);
        self.is_websocket = true;
    }

    /// Claim the raw connection. Fails for requests that cannot be upgraded.
    pub(crate) fn hijack(&mut self) -> Result<(), HijackError> {
        let conn = HijackedConn::take(&mut self.request)?;
        self.hijacked = Some(conn);
        Ok(())
    }

    pub(crate) fn take_response(&mut self) -> Option<Pooled<ResponseSink>> {
        self.response.take()
    }

    pub(crate) fn set_session_id(&mut self, id: String) {
        self.session_id = id;
    }

    // --- request ---

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn uri(&self) -> &Uri {
        &self.request.uri
    }

    pub fn version(&self) -> Version {
        self.request.version
    }

    /// Protocol as written on the request line, e.g. `HTTP/1.1`.
    pub fn proto(&self) -> String {
        format!("{:?}", self.request.version)
    }

    pub fn path(&self) -> &str {
        self.request.uri.path()
    }

    pub fn query_string(&self) -> &str {
        self.request.uri.query().unwrap_or_default()
    }

    pub fn url(&self) -> String {
        self.request.uri.to_string()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.request.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request extensions (connection info, upgrade handles, ...).
    pub fn extensions(&self) -> &Extensions {
        &self.request.extensions
    }

    /// Declared body length, 0 when absent or unparsable.
    pub fn content_length(&self) -> u64 {
        content_length(&self.request.headers)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Caller IP, empty when the connection address is unknown.
    pub fn remote_ip(&self) -> String {
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    /// Route parameters in declaration order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Take the request body; later calls return `None`.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Read the whole body, up to `limit` bytes.
    pub async fn body_bytes(&mut self, limit: usize) -> Result<Bytes, HandlerError> {
        match self.body.take() {
            Some(body) => Ok(to_bytes(body, limit).await?),
            None => Ok(Bytes::new()),
        }
    }

    // --- session & items ---

    /// Session identifier, empty when sessions are disabled.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Typed values shared between hooks and the handler of this request.
    pub fn items(&self) -> &Extensions {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Extensions {
        &mut self.items
    }

    // --- response ---

    pub fn response(&self) -> Option<&ResponseSink> {
        self.response.as_deref()
    }

    pub fn response_mut(&mut self) -> Option<&mut ResponseSink> {
        self.response.as_deref_mut()
    }

    fn sink(&mut self) -> Result<&mut ResponseSink, HandlerError> {
        self.response_mut().ok_or(HandlerError::NoResponse)
    }

    pub fn write_header(&mut self, status: StatusCode) -> HandlerResult {
        self.sink()?.write_header(status);
        Ok(())
    }

    pub fn set_header(&mut self, name: HeaderName, value: &str) -> HandlerResult {
        self.sink()?.set_header(name, value)?;
        Ok(())
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) -> HandlerResult {
        self.sink()?.set_cookie(cookie)?;
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> HandlerResult {
        self.sink()?.write(data)?;
        Ok(())
    }

    pub fn write_string(&mut self, text: &str) -> HandlerResult {
        self.write_bytes(text.as_bytes())
    }

    /// Serialize `value` as the body with a JSON content type.
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value)?;
        let sink = self.sink()?;
        sink.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_JSON_UTF8),
        );
        sink.write(&body)?;
        Ok(())
    }

    pub fn redirect(&mut self, status: StatusCode, location: &str) -> HandlerResult {
        self.sink()?.redirect(status, location)?;
        Ok(())
    }

    /// Skip the handler; post-hooks still run.
    pub fn end(&mut self) {
        self.ended = true;
    }

    pub fn is_end(&self) -> bool {
        self.ended
    }

    // --- transports ---

    pub fn is_websocket(&self) -> bool {
        self.is_websocket
    }

    pub fn websocket(&mut self) -> Result<&mut WebSocket, HandlerError> {
        self.websocket.as_mut().ok_or(HandlerError::NoWebSocket)
    }

    pub fn is_hijacked(&self) -> bool {
        self.hijacked.is_some()
    }

    /// Raw connection claimed for a streaming route.
    pub fn take_hijacked(&mut self) -> Option<HijackedConn> {
        self.hijacked.take()
    }

    // --- server ---

    pub fn server(&self) -> Option<&Arc<ServerCore>> {
        self.server.as_ref()
    }

    /// Configuration snapshot in effect for this request.
    pub fn config(&self) -> Option<Arc<WebConfig>> {
        self.server.as_ref().map(|server| server.config())
    }
}

impl Recycle for HttpContext {
    fn recycle(&mut self) {
        self.request = empty_parts();
        self.body = None;
        self.remote_addr = None;
        // Normally taken by the pipeline already; dropping returns it to its pool.
        self.response = None;
        self.session_id.clear();
        self.params.clear();
        self.websocket = None;
        self.is_websocket = false;
        self.hijacked = None;
        self.ended = false;
        self.items.clear();
        self.server = None;
    }
}

impl fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContext")
            .field("method", &self.request.method)
            .field("uri", &self.request.uri)
            .field("remote_addr", &self.remote_addr)
            .field("session_id", &self.session_id)
            .field("params", &self.params)
            .field("is_websocket", &self.is_websocket)
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}

/// Parse `Content-Length`, 0 when absent or unparsable.
pub fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::WebConfig;

    fn core() -> Arc<ServerCore> {
        App::new(WebConfig::default()).build().unwrap().core()
    }

    fn parts(uri: &str) -> Parts {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_LENGTH, "5")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn exposes_request_and_params() {
        let core = core();
        let mut ctx = HttpContext::default();
        ctx.reset(
            parts("/users/42?tab=posts"),
            Body::from("hello"),
            Some("10.0.0.7:5555".parse().unwrap()),
            Some(core.pool().acquire_response()),
            core,
        );
        ctx.set_params([("id", "42")]);

        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.query_string(), "tab=posts");
        assert_eq!(ctx.proto(), "HTTP/1.1");
        assert_eq!(ctx.remote_ip(), "10.0.0.7");
        assert_eq!(ctx.content_length(), 5);
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.param("missing"), None);
        assert_eq!(&ctx.body_bytes(1024).await.unwrap()[..], b"hello");
        assert!(ctx.body_bytes(1024).await.unwrap().is_empty());
    }

    #[test]
    fn recycle_forgets_previous_tenant() {
        let core = core();
        let mut ctx = HttpContext::default();
        ctx.reset(parts("/a"), Body::empty(), None, Some(core.pool().acquire_response()), core);
        ctx.set_session_id("sid".into());
        ctx.set_params([("k", "v")]);
        ctx.items_mut().insert(7_u32);
        ctx.end();

        ctx.recycle();
        assert_eq!(ctx.path(), "/");
        assert!(ctx.session_id().is_empty());
        assert!(ctx.params().is_empty());
        assert!(ctx.items().get::<u32>().is_none());
        assert!(!ctx.is_end());
        assert!(ctx.response().is_none());
        assert!(ctx.server().is_none());
    }

    #[test]
    fn writers_require_a_sink() {
        let mut ctx = HttpContext::default();
        assert!(matches!(ctx.write_string("x"), Err(HandlerError::NoResponse)));
        assert!(matches!(ctx.websocket(), Err(HandlerError::NoWebSocket)));
    }
}
