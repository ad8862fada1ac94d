//! Application assembly.
//!
//! # Data Flow
//! ```text
//! App (routes, hooks, handlers)
//!     → build(): session manager, ServerCore, pipelines per route
//!     → HttpServer (front door router + run loop)
//! ```
//!
//! # Design Decisions
//! - Routes are recorded first and wrapped at build time, once the shared
//!   core exists
//! - Hooks and handlers are immutable after `build`
//! - A failing session store aborts the build

pub mod server_core;
pub mod offline;

pub use self::server_core::ServerCore;
pub use self::offline::{DefaultOfflineServer, OfflineHandler};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::routing::{get, MethodFilter, MethodRouter};
use axum::Router;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::WebConfig;
use crate::http::context::HttpContext;
use crate::http::fault::{Fault, HandlerResult};
use crate::http::files::FileRoute;
use crate::http::front_door::{FrontDoor, NormalDispatch};
use crate::http::handler::{ExceptionHandle, HttpHandle, HttpModule};
use crate::http::pipeline::{Pipeline, TransportMode};
use crate::http::HttpServer;
use crate::session::{SessionBinder, SessionError, SessionManager};

/// Errors that prevent a server from being built or run.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("session manager initialization failed: {0}")]
    Session(#[from] SessionError),

    #[error("unsupported route method: {0}")]
    Method(Method),

    #[error("invalid address {0}")]
    Address(String),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

enum RouteKind {
    Http {
        method: Option<Method>,
        handle: HttpHandle,
        mode: TransportMode,
    },
    Files(PathBuf),
}

/// Builder for an [`HttpServer`].
pub struct App {
    config: WebConfig,
    routes: BTreeMap<String, Vec<RouteKind>>,
    websockets: Vec<(String, HttpHandle)>,
    not_found: Option<HttpHandle>,
    modules: Vec<HttpModule>,
    exception_handler: Option<ExceptionHandle>,
    offline_handler: Arc<dyn OfflineHandler>,
    session_manager: Option<Arc<dyn SessionManager>>,
}

impl App {
    pub fn new(config: WebConfig) -> Self {
        Self {
            config,
            routes: BTreeMap::new(),
            websockets: Vec::new(),
            not_found: None,
            modules: Vec::new(),
            exception_handler: None,
            offline_handler: Arc::new(DefaultOfflineServer),
            session_manager: None,
        }
    }

    pub fn get<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Method::GET, path, f)
    }

    pub fn post<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Method::POST, path, f)
    }

    pub fn put<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Method::PUT, path, f)
    }

    pub fn delete<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Method::DELETE, path, f)
    }

    pub fn patch<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handle(Method::PATCH, path, f)
    }

    /// Route every method on `path` that has no method-specific handler.
    pub fn any<F>(self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.push(path, None, Arc::new(f), TransportMode::Standard)
    }

    pub fn handle<F>(self, method: Method, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.push(path, Some(method), Arc::new(f), TransportMode::Standard)
    }

    /// A route whose handler takes over the connection.
    ///
    /// Requests that cannot be upgraded are answered with `500` before any
    /// hook runs.
    pub fn streaming<F>(self, method: Method, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.push(path, Some(method), Arc::new(f), TransportMode::Streaming)
    }

    /// A WebSocket route; the handler runs once per connection.
    pub fn websocket<F>(mut self, path: &str, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.websockets.push((path.to_owned(), Arc::new(f)));
        self
    }

    /// Serve `dir` on a wildcard route, e.g. `/static/{*filepath}`.
    pub fn serve_files(mut self, path: &str, dir: impl Into<PathBuf>) -> Self {
        self.routes
            .entry(path.to_owned())
            .or_default()
            .push(RouteKind::Files(dir.into()));
        self
    }

    /// Handler for requests no route matches. Runs through the full pipeline.
    pub fn not_found<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut HttpContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(f));
        self
    }

    /// Append a hook pair. Hooks run in registration order.
    pub fn use_module(mut self, module: HttpModule) -> Self {
        self.modules.push(module);
        self
    }

    /// Called with the context and the fault whenever a request fails.
    pub fn set_exception_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut HttpContext, &Fault) + Send + Sync + 'static,
    {
        self.exception_handler = Some(Arc::new(f));
        self
    }

    pub fn set_offline_handler(mut self, handler: impl OfflineHandler + 'static) -> Self {
        self.offline_handler = Arc::new(handler);
        self
    }

    /// Use a custom session manager instead of the built-in cookie manager.
    pub fn set_session_manager(mut self, manager: Arc<dyn SessionManager>) -> Self {
        self.session_manager = Some(manager);
        self
    }

    fn push(mut self, path: &str, method: Option<Method>, handle: HttpHandle, mode: TransportMode) -> Self {
        self.routes
            .entry(path.to_owned())
            .or_default()
            .push(RouteKind::Http { method, handle, mode });
        self
    }

    /// Freeze the application into a server.
    pub fn build(self) -> Result<HttpServer, ServerError> {
        let sessions = SessionBinder::new();
        if let Some(manager) = self.session_manager {
            sessions.install(manager);
        }
        if self.config.session.enabled {
            sessions.ensure_initialized(&self.config.session)?;
        }

        let auto_head = self.config.server.enabled_auto_head;
        let core = Arc::new(ServerCore::new(
            self.config,
            sessions,
            self.modules,
            self.exception_handler,
            self.offline_handler,
        ));

        let mut http = Router::new();
        for (path, entries) in self.routes {
            http = http.route(&path, method_router(&core, entries, auto_head)?);
        }
        if let Some(handle) = self.not_found {
            let pipeline = Arc::new(Pipeline::new(Arc::clone(&core), handle, TransportMode::Standard));
            http = http.fallback(move |request: Request| {
                Arc::clone(&pipeline).spawn(request)
            });
        }

        let normal = NormalDispatch::new(Arc::clone(&core), http);
        let mut websocket = Router::new();
        for (path, handle) in self.websockets {
            let pipeline = Arc::new(Pipeline::new(Arc::clone(&core), handle, TransportMode::WebSocket));
            websocket = websocket.route(
                &path,
                get(move |upgrade: WebSocketUpgrade, request: Request| {
                    let pipeline = Arc::clone(&pipeline);
                    async move {
                        let (parts, _) = request.into_parts();
                        upgrade.on_upgrade(move |socket| async move {
                            pipeline.serve_socket(socket, parts).await;
                        })
                    }
                }),
            );
        }
        let fallthrough = normal.clone();
        let websocket = websocket.fallback(move |request: Request| {
            let normal = fallthrough.clone();
            async move { normal.dispatch(request).await }
        });

        Ok(HttpServer::new(core, FrontDoor::new(normal, websocket)))
    }
}

fn method_router(
    core: &Arc<ServerCore>,
    entries: Vec<RouteKind>,
    auto_head: bool,
) -> Result<MethodRouter, ServerError> {
    let mut router = MethodRouter::new();
    let mut has_get = false;
    let mut has_head = false;

    for entry in entries {
        match entry {
            RouteKind::Http { method, handle, mode } => {
                let pipeline = Arc::new(Pipeline::new(Arc::clone(core), handle, mode));
                let handler = move |request: Request| {
                    Arc::clone(&pipeline).spawn(request)
                };
                router = match method {
                    Some(method) => {
                        has_get |= method == Method::GET;
                        has_head |= method == Method::HEAD;
                        let filter = MethodFilter::try_from(method.clone())
                            .map_err(|_| ServerError::Method(method))?;
                        router.on(filter, handler)
                    }
                    None => router.fallback(handler),
                };
            }
            RouteKind::Files(dir) => {
                let files = FileRoute::new(Arc::clone(core), dir);
                router = router.fallback(move |request: Request| {
                    let files = files.clone();
                    async move { files.serve(request).await }
                });
            }
        }
    }

    if has_get && !has_head && !auto_head {
        router = router.head(|| async { StatusCode::METHOD_NOT_ALLOWED });
    }
    Ok(router)
}
