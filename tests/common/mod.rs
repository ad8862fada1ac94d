//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::io::Read;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use flate2::read::GzDecoder;
use futures_util::future::BoxFuture;
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

use weblane::{HandlerResult, HttpContext, HttpServer, Shutdown};

/// Send one request through the router in-process.
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

pub fn ok(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { ctx.write_string("ok") })
}

pub fn boom(_ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { panic!("boom") })
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<weblane::WebConfig>,
    handle: tokio::task::JoinHandle<Result<(), weblane::ServerError>>,
}

impl TestServer {
    pub async fn start(server: HttpServer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let (config_updates, updates) = mpsc::unbounded_channel();
        let server_shutdown = shutdown.subscribe();
        let handle = tokio::spawn(async move { server.run(listener, updates, server_shutdown).await });
        Self {
            addr,
            shutdown,
            config_updates,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
