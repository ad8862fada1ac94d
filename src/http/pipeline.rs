//! The request lifecycle engine.
//!
//! # Responsibilities
//! - Lease a response sink and a context from the pool for every request
//! - Optional gzip, session binding and connection hijack
//! - Run pre-hooks, the handler and post-hooks behind a fault barrier
//! - Report faults, write the access log, hand the response to hyper
//!
//! # Design Decisions
//! - One skeleton for standard, streaming and WebSocket routes
//! - The fault barrier is `catch_unwind` around the stage future, so a panic
//!   never unwinds into hyper's connection task
//! - Pooled objects are RAII guards and go back on every exit path
//! - Routes run the lifecycle on a spawned task, so a client disconnect
//!   does not cut the handler or the finalizer short

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ws::WebSocket as RawWebSocket;
use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams, Request};
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::app::ServerCore;
use crate::http::access_log::{self, ErrorRecord};
use crate::http::context::{HttpContext, TEXT_PLAIN_UTF8};
use crate::http::fault::{Fault, PanicMessage};
use crate::http::gzip;
use crate::http::handler::{HttpHandle, HttpModule};
use crate::http::hijack::HijackError;
use crate::http::websocket::WebSocket;
use crate::observability::{metrics, LOG_TARGET_HTTP_SERVER};
use crate::pool::Pooled;

/// How the route's connection is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Buffered request/response.
    Standard,
    /// The handler takes over the raw connection.
    Streaming,
    /// One handler call per accepted WebSocket connection.
    WebSocket,
}

impl TransportMode {
    fn location(self) -> &'static str {
        match self {
            TransportMode::Standard => "pipeline::standard",
            TransportMode::Streaming => "pipeline::streaming",
            TransportMode::WebSocket => "pipeline::websocket",
        }
    }
}

/// A user handler bound to the server core.
pub(crate) struct Pipeline {
    core: Arc<ServerCore>,
    handle: HttpHandle,
    mode: TransportMode,
}

impl Pipeline {
    pub(crate) fn new(core: Arc<ServerCore>, handle: HttpHandle, mode: TransportMode) -> Self {
        Self { core, handle, mode }
    }

    /// Run [`serve`](Self::serve) on its own task.
    ///
    /// hyper drops the connection future when the client goes away; the
    /// detached task still runs the handler, the post-hooks and the finalizer.
    pub(crate) async fn spawn(self: Arc<Self>, request: Request) -> Response {
        let url = request.uri().to_string();
        match tokio::spawn(async move { self.serve(request).await }).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    target: LOG_TARGET_HTTP_SERVER,
                    url = %url,
                    error = %err,
                    "request task failed"
                );
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /// Run one request through the standard or streaming lifecycle.
    pub(crate) async fn serve(&self, request: Request) -> Response {
        let core = &self.core;
        let config = core.config();
        let (mut parts, body) = request.into_parts();
        let params = RawPathParams::from_request_parts(&mut parts, &()).await.ok();
        let remote_addr = remote_addr(&parts);

        let mut sink = core.pool().acquire_response();
        sink.reset();
        let transcoded = if config.server.enabled_gzip {
            gzip::transcode(&mut sink, config.server.gzip_level)
        } else {
            Ok(())
        };

        let mut ctx = core.pool().acquire_context();
        ctx.reset(parts, body, remote_addr, Some(sink), Arc::clone(core));
        if let Some(params) = &params {
            ctx.set_params(params.iter());
        }

        core.state().add_request_count(1);

        let outcome = match transcoded {
            Ok(()) => {
                if config.session.enabled {
                    core.sessions().bind(&mut ctx);
                }
                if self.mode == TransportMode::Streaming {
                    if let Err(err) = ctx.hijack() {
                        return reject_hijack(ctx, &err);
                    }
                }
                Ok(())
            }
            Err(err) => Err(Fault::Transcode(err)),
        };

        let started = Instant::now();
        let outcome = match outcome {
            Ok(()) => guard(run_stages(core.modules(), &self.handle, &mut ctx)).await,
            Err(fault) => Err(fault),
        };
        if let Err(fault) = &outcome {
            recover(core, &mut ctx, fault, self.mode.location(), true);
        }

        let elapsed = started.elapsed();
        log_access(&ctx, elapsed);
        finish(ctx)
    }

    /// Run the handler once for an accepted WebSocket connection.
    pub(crate) async fn serve_socket(&self, socket: RawWebSocket, parts: Parts) {
        let core = &self.core;
        let remote_addr = remote_addr(&parts);

        let mut ctx = core.pool().acquire_context();
        ctx.reset(parts, Body::empty(), remote_addr, None, Arc::clone(core));
        ctx.attach_websocket(WebSocket::new(socket));

        let started = Instant::now();
        let handle = &self.handle;
        let ctx_ref: &mut HttpContext = &mut ctx;
        let outcome = guard(async {
            let handled = handle(&mut *ctx_ref).await;
            core.state().add_request_count(1);
            handled.map_err(Fault::Handler)
        })
        .await;
        if let Err(fault) = &outcome {
            recover(core, &mut ctx, fault, self.mode.location(), false);
        }

        log_access(&ctx, started.elapsed());
    }
}

/// Run `stages`, turning a panic into a [`Fault`].
async fn guard<F>(stages: F) -> Result<(), Fault>
where
    F: Future<Output = Result<(), Fault>>,
{
    match AssertUnwindSafe(stages).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(Fault::Panic(PanicMessage::new(payload))),
    }
}

/// Pre-hooks, handler, post-hooks.
async fn run_stages(
    modules: &[HttpModule],
    handle: &HttpHandle,
    ctx: &mut HttpContext,
) -> Result<(), Fault> {
    for module in modules {
        module.begin(ctx).map_err(Fault::Hook)?;
    }

    let handled = if ctx.is_end() {
        Ok(())
    } else {
        handle(&mut *ctx).await
    };

    let mut ended = Ok(());
    for module in modules {
        if let Err(err) = module.end(ctx) {
            ended = Err(err);
            break;
        }
    }

    handled.map_err(Fault::Handler)?;
    ended.map_err(Fault::Hook)
}

/// Report a fault: application handler, error record, error counter.
fn recover(
    core: &ServerCore,
    ctx: &mut HttpContext,
    fault: &Fault,
    location: &str,
    notify_app: bool,
) {
    let diagnostic = fault.diagnostic(location);

    if notify_app {
        if let Some(handler) = core.exception_handler() {
            let contained =
                std::panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *ctx, fault)));
            if let Err(payload) = contained {
                tracing::error!(
                    target: LOG_TARGET_HTTP_SERVER,
                    panic = %PanicMessage::new(payload),
                    "exception handler panicked"
                );
            }
        }
    }

    let url = ctx.url();
    let empty = HeaderMap::new();
    let headers = if ctx.is_websocket() {
        ctx.headers()
    } else {
        ctx.response().map_or(&empty, |sink| sink.headers())
    };
    ErrorRecord::new(&url, headers, &diagnostic).emit();
    core.state().add_error_count(1);
}

fn log_access(ctx: &HttpContext, elapsed: Duration) {
    let line = access_log::log_context(ctx, elapsed.as_millis());
    access_log::emit_access(&ctx.url(), &line);

    let status = match ctx.response() {
        Some(sink) if !ctx.is_websocket() => sink.status().as_u16(),
        _ => 0,
    };
    metrics::record_latency(ctx.method().as_str(), status, elapsed);
}

/// Drain the sink into the outgoing response. Both guards drop here.
fn finish(mut ctx: Pooled<HttpContext>) -> Response {
    match ctx.take_response() {
        Some(mut sink) => sink.take_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn reject_hijack(mut ctx: Pooled<HttpContext>, err: &HijackError) -> Response {
    if let Some(sink) = ctx.response_mut() {
        // The rejection is never compressed.
        sink.writer_mut().clear();
        sink.headers_mut().remove(CONTENT_ENCODING);
        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        sink.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
        if let Err(err) = sink.write(err.to_string().as_bytes()) {
            tracing::warn!(error = %err, "failed to write hijack rejection");
        }
    }
    finish(ctx)
}

fn remote_addr(parts: &Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}
