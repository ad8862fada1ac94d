//! Access-log and error-record formatting.
//!
//! Access lines are space-joined:
//! `method caller proto status request-bytes response-bytes elapsed-ms`, and
//! emitted as `<url> <line>` on the `http_request` target.

use std::net::SocketAddr;

use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Serialize;

use crate::http::context::{content_length, HttpContext};
use crate::observability::{LOG_TARGET_HTTP_REQUEST, LOG_TARGET_HTTP_SERVER};

/// Access line for a pipeline-managed request.
///
/// WebSocket connections have no sink; they report status and response
/// length as `0`.
pub fn log_context(ctx: &HttpContext, elapsed_ms: u128) -> String {
    let (status, response_len) = match ctx.response() {
        Some(sink) if !ctx.is_websocket() => (sink.status().as_u16(), sink.size()),
        _ => (0, 0),
    };
    let fields: [&str; 7] = [
        ctx.method().as_str(),
        &ctx.remote_ip(),
        &ctx.proto(),
        &status.to_string(),
        &ctx.content_length().to_string(),
        &response_len.to_string(),
        &elapsed_ms.to_string(),
    ];
    fields.join(" ")
}

/// Access line for a file-serving request.
///
/// The caller is the full socket address, the status is always `200` and the
/// response length is left empty.
pub fn log_request(request: &Parts, remote_addr: Option<SocketAddr>, elapsed_ms: u128) -> String {
    let caller = remote_addr.map(|addr| addr.to_string()).unwrap_or_default();
    let fields: [&str; 7] = [
        request.method.as_str(),
        &caller,
        &format!("{:?}", request.version),
        "200",
        &content_length(&request.headers).to_string(),
        "",
        &elapsed_ms.to_string(),
    ];
    fields.join(" ")
}

pub(crate) fn emit_access(url: &str, line: &str) {
    tracing::debug!(target: LOG_TARGET_HTTP_REQUEST, "{url} {line}");
}

/// JSON record written for every recovered fault.
#[derive(Debug, Serialize)]
pub struct ErrorRecord<'a> {
    pub request_url: &'a str,
    pub http_header: String,
    pub http_body: &'a str,
}

impl<'a> ErrorRecord<'a> {
    pub fn new(request_url: &'a str, headers: &HeaderMap, diagnostic: &'a str) -> Self {
        Self {
            request_url,
            http_header: format!("{headers:?}"),
            http_body: diagnostic,
        }
    }

    pub(crate) fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::error!(target: LOG_TARGET_HTTP_SERVER, "{json}"),
            Err(err) => tracing::error!(
                target: LOG_TARGET_HTTP_SERVER,
                error = %err,
                url = %self.request_url,
                "{}",
                self.http_body
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Method, Request};

    #[test]
    fn file_line_has_fixed_status_and_empty_length() {
        let (parts, ()) = Request::builder()
            .method(Method::GET)
            .uri("/static/app.css")
            .header(header::CONTENT_LENGTH, "12")
            .body(())
            .unwrap()
            .into_parts();
        let line = log_request(&parts, Some("127.0.0.1:4000".parse().unwrap()), 3);
        assert_eq!(line, "GET 127.0.0.1:4000 HTTP/1.1 200 12  3");
    }

    #[test]
    fn file_line_without_peer_or_length() {
        let (parts, ()) = Request::new(()).into_parts();
        assert_eq!(log_request(&parts, None, 0), "GET  HTTP/1.1 200 0  0");
    }

    #[test]
    fn error_record_serializes_fields() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        let record = ErrorRecord::new("/boom", &headers, "pipeline::standard [panic] boom");

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["request_url"], "/boom");
        assert_eq!(json["http_body"], "pipeline::standard [panic] boom");
        assert!(json["http_header"].as_str().unwrap().contains("text/plain"));
    }
}
