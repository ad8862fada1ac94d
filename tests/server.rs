//! End-to-end tests against real listeners.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{CONNECTION, UPGRADE};
use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

use weblane::{App, HandlerResult, HttpContext, HttpModule, WebConfig};

mod common;
use common::{boom, eventually, ok, TestServer};

fn echo(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let socket = ctx.websocket()?;
        while let Some(message) = socket.read_message().await? {
            socket.send_message(&message).await?;
        }
        Ok(())
    })
}

fn slow(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        ctx.write_string("late")
    })
}

fn raw_stream(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let Some(conn) = ctx.take_hijacked() else {
            return Err(weblane::HandlerError::message("not hijacked"));
        };
        ctx.set_header(CONNECTION, "upgrade")?;
        ctx.set_header(UPGRADE, "raw")?;
        ctx.write_header(StatusCode::SWITCHING_PROTOCOLS)?;
        tokio::spawn(async move {
            if let Ok(mut io) = conn.upgraded().await {
                let _ = io.write_all(b"hello over raw tcp").await;
                let _ = io.shutdown().await;
            }
        });
        Ok(())
    })
}

#[tokio::test]
async fn serves_over_tcp_and_stops_on_shutdown() {
    let server = App::new(WebConfig::default()).get("/", ok).build().unwrap();
    let state = std::sync::Arc::clone(server.state());
    let running = TestServer::start(server).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client.get(running.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["server"], "weblane");
    assert_eq!(response.text().await.unwrap(), "ok");
    assert_eq!(state.request_count(), 1);

    running.stop().await;
}

#[tokio::test]
async fn config_updates_apply_while_running() {
    let server = App::new(WebConfig::default()).get("/", ok).build().unwrap();
    let core = server.core();
    let running = TestServer::start(server).await;

    let mut next = WebConfig::default();
    next.server.offline = true;
    running.config_updates.send(next).unwrap();
    assert!(eventually(|| core.is_offline()).await);

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client.get(running.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 503);

    running.stop().await;
}

#[tokio::test]
async fn websocket_echo_counts_the_connection() {
    let server = App::new(WebConfig::default()).websocket("/ws/echo", echo).build().unwrap();
    let state = std::sync::Arc::clone(server.state());
    let stats = server.core();
    let running = TestServer::start(server).await;

    let (mut socket, response) = tokio_tungstenite::connect_async(format!("ws://{}/ws/echo", running.addr))
        .await
        .unwrap();
    assert_eq!(response.headers()["server"], "weblane");

    socket.send(Message::text("ping?")).await.unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "ping?");
    assert_eq!(state.request_count(), 0, "counted when the handler returns");

    socket.close(None).await.unwrap();
    assert!(eventually(|| state.request_count() == 1).await);
    assert!(eventually(|| stats.pool().stats().contexts.in_use() == 0).await);
    assert_eq!(state.error_count(), 0);

    running.stop().await;
}

#[tokio::test]
async fn unmatched_upgrade_falls_through_to_streaming_route() {
    let server = App::new(WebConfig::default())
        .streaming(Method::GET, "/raw", raw_stream)
        .build()
        .unwrap();
    let running = TestServer::start(server).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream
        .write_all(b"GET /raw HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\nUpgrade: raw\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    let received = String::from_utf8_lossy(&received);
    assert!(received.starts_with("HTTP/1.1 101"), "{received}");
    assert!(received.to_ascii_lowercase().contains("server: weblane"), "{received}");
    assert!(received.ends_with("hello over raw tcp"), "{received}");

    running.stop().await;
}

#[tokio::test]
async fn static_files_are_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "static hello").unwrap();

    let server = App::new(WebConfig::default())
        .serve_files("/static/{*filepath}", dir.path())
        .build()
        .unwrap();
    let state = std::sync::Arc::clone(server.state());
    let running = TestServer::start(server).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client.get(running.url("/static/hello.txt")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["server"], "weblane");
    assert_eq!(response.text().await.unwrap(), "static hello");

    let response = client.get(running.url("/static/missing.txt")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(state.request_count(), 2);

    running.stop().await;
}

#[tokio::test]
async fn client_disconnect_still_runs_post_hooks() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let server = App::new(WebConfig::default())
        .get("/slow", slow)
        .use_module(HttpModule::new().on_end(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .build()
        .unwrap();
    let core = server.core();
    let running = TestServer::start(server).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream
        .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stream);

    assert!(eventually(|| finished.load(Ordering::SeqCst) == 1).await);
    assert_eq!(core.state().request_count(), 1);
    assert!(eventually(|| core.pool().stats().contexts.in_use() == 0).await);
    assert_eq!(core.pool().stats().responses.in_use(), 0);

    running.stop().await;
}

#[tokio::test]
async fn websocket_panic_is_recovered_and_not_counted() {
    let server = App::new(WebConfig::default()).websocket("/ws/boom", boom).build().unwrap();
    let state = Arc::clone(server.state());
    let core = server.core();
    let running = TestServer::start(server).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/boom", running.addr))
        .await
        .unwrap();

    assert!(eventually(|| state.error_count() == 1).await);
    assert_eq!(state.request_count(), 0);
    assert!(eventually(|| core.pool().stats().contexts.in_use() == 0).await);

    // The server dropped its end; the client sees the stream end.
    let _ = tokio::time::timeout(Duration::from_secs(1), socket.next()).await;
    running.stop().await;
}
