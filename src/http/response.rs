//! Pooled response sink.
//!
//! # Responsibilities
//! - Buffer the body the handler writes (optionally through gzip)
//! - Track status, whether the header was written, and bytes written
//! - Emit cookies
//! - Turn itself into an `axum` response at the end of the request
//!
//! # Design Decisions
//! - The first body write commits the status (200 unless set earlier)
//! - A second `write_header` is ignored, like a header already on the wire
//! - `size` counts bytes the handler wrote, before compression

use std::fmt;
use std::io;

use axum::body::Body;
use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;

use crate::http::gzip::BodyWriter;
use crate::pool::Recycle;

/// Outbound half of a request.
#[derive(Default)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    header_written: bool,
    size: u64,
    writer: BodyWriter,
}

impl ResponseSink {
    /// Prepare for a new request.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.header_written = false;
        self.size = 0;
        self.writer.clear();
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Bytes written by the handler so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn is_gzip(&self) -> bool {
        self.writer.is_gzip()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn writer_mut(&mut self) -> &mut BodyWriter {
        &mut self.writer
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(
        &mut self,
        name: HeaderName,
        value: &str,
    ) -> Result<(), InvalidHeaderValue> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// Commit the status code. Later calls are ignored.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.header_written {
            tracing::warn!(
                current = %self.status,
                ignored = %status,
                "superfluous write_header call"
            );
            return;
        }
        self.status = status;
        self.header_written = true;
    }

    /// Append body bytes, committing a 200 status first if needed.
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.header_written {
            self.write_header(StatusCode::OK);
        }
        self.writer.write_all(data)?;
        self.size += data.len() as u64;
        Ok(data.len())
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) -> Result<(), InvalidHeaderValue> {
        let value = HeaderValue::from_str(&cookie.to_string())?;
        self.headers.append(header::SET_COOKIE, value);
        Ok(())
    }

    /// Set `Location` and commit a redirect status.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<(), InvalidHeaderValue> {
        self.set_header(header::LOCATION, location)?;
        self.write_header(status);
        Ok(())
    }

    /// Drain status, headers and body into a response.
    ///
    /// Finishing flushes a gzip encoder, so this must run after every hook and
    /// handler has returned.
    pub(crate) fn take_response(&mut self) -> Response {
        let gzip = self.writer.is_gzip();
        let body = match self.writer.finish() {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to flush response body");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                Bytes::new()
            }
        };
        let body = if forbids_body(self.status) {
            self.headers.remove(header::CONTENT_ENCODING);
            self.headers.remove(header::CONTENT_LENGTH);
            Body::empty()
        } else {
            if gzip {
                // Any length a handler set refers to the uncompressed body.
                self.headers.remove(header::CONTENT_LENGTH);
            }
            Body::from(body)
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        response
    }
}

/// 1xx, 204 and 304 responses carry no body (RFC 9110 section 6.4.1).
fn forbids_body(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

impl Recycle for ResponseSink {
    fn recycle(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSink")
            .field("status", &self.status)
            .field("header_written", &self.header_written)
            .field("size", &self.size)
            .field("gzip", &self.writer.is_gzip())
            .finish()
    }
}

/// A `Set-Cookie` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<u64>,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            http_only: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age = Some(secs);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn first_write_commits_ok() {
        let mut sink = ResponseSink::default();
        sink.write(b"ok").unwrap();
        assert!(sink.header_written());
        assert_eq!(sink.status(), StatusCode::OK);
        assert_eq!(sink.size(), 2);

        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.status(), StatusCode::OK, "header already committed");
    }

    #[test]
    fn cookie_renders_attributes() {
        let cookie = Cookie::new("sid", "abc").with_path("/").with_max_age(60).http_only();
        assert_eq!(cookie.to_string(), "sid=abc; Path=/; Max-Age=60; HttpOnly");
    }

    #[test]
    fn reset_clears_previous_tenant() {
        let mut sink = ResponseSink::default();
        sink.write_header(StatusCode::NOT_FOUND);
        sink.set_cookie(&Cookie::new("a", "b")).unwrap();
        sink.write(b"stale").unwrap();

        sink.reset();
        assert_eq!(sink.status(), StatusCode::OK);
        assert!(!sink.header_written());
        assert_eq!(sink.size(), 0);
        assert!(sink.headers().is_empty());
    }

    #[tokio::test]
    async fn take_response_moves_everything_out() {
        let mut sink = ResponseSink::default();
        sink.write_header(StatusCode::CREATED);
        sink.set_header(header::CONTENT_TYPE, "text/plain").unwrap();
        sink.write(b"made").unwrap();

        let response = sink.take_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"made");
        assert!(sink.headers().is_empty());
    }

    #[tokio::test]
    async fn bodyless_status_drops_encoding_and_body() {
        let mut sink = ResponseSink::default();
        crate::http::gzip::transcode(&mut sink, 6).unwrap();
        sink.set_header(header::CONTENT_LENGTH, "20").unwrap();
        sink.write_header(StatusCode::SWITCHING_PROTOCOLS);

        let response = sink.take_response();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn not_modified_has_no_body() {
        let mut sink = ResponseSink::default();
        sink.write_header(StatusCode::NOT_MODIFIED);
        sink.write(b"ignored").unwrap();

        let response = sink.take_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
