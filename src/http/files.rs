//! Static-file routes.
//!
//! Registered on a wildcard route whose tail parameter is named `filepath`,
//! e.g. `/static/{*filepath}`. File routes bypass the pool, the hooks and the
//! fault barrier; they only count the request and write an access line.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams, Request};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::app::ServerCore;
use crate::http::access_log;

/// Name of the wildcard parameter holding the file path.
pub const FILEPATH_PARAM: &str = "filepath";

/// Characters escaped when the decoded file path is put back into a URI.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Clone)]
pub(crate) struct FileRoute {
    core: Arc<ServerCore>,
    files: ServeDir,
}

impl FileRoute {
    pub(crate) fn new(core: Arc<ServerCore>, dir: impl AsRef<Path>) -> Self {
        Self {
            core,
            files: ServeDir::new(dir),
        }
    }

    pub(crate) async fn serve(&self, request: Request) -> Response {
        self.core.state().add_request_count(1);
        let started = Instant::now();

        let (mut parts, body) = request.into_parts();
        let filepath = RawPathParams::from_request_parts(&mut parts, &())
            .await
            .ok()
            .and_then(|params| {
                params
                    .iter()
                    .find(|(key, _)| *key == FILEPATH_PARAM)
                    .map(|(_, value)| value.to_owned())
            })
            .unwrap_or_default();

        let mut target = format!("/{}", utf8_percent_encode(filepath.trim_start_matches('/'), PATH));
        if let Some(query) = parts.uri.query() {
            target.push('?');
            target.push_str(query);
        }
        let response = match Uri::try_from(target) {
            Ok(uri) => {
                let mut forwarded = Request::new(body);
                *forwarded.method_mut() = parts.method.clone();
                *forwarded.uri_mut() = uri;
                *forwarded.version_mut() = parts.version;
                *forwarded.headers_mut() = parts.headers.clone();
                match self.files.clone().oneshot(forwarded).await {
                    Ok(response) => response.map(Body::new),
                    Err(never) => match never {},
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, path = %filepath, "unroutable file path");
                StatusCode::BAD_REQUEST.into_response()
            }
        };

        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let line = access_log::log_request(&parts, remote_addr, started.elapsed().as_millis());
        access_log::emit_access(&parts.uri.to_string(), &line);
        response
    }
}
