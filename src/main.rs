//! weblane demo server.
//!
//! Serves a greeting on `/`, a JSON echo of the session on `/session`,
//! static files from `server.static_dir` under `/static/`, and a WebSocket
//! echo on `/ws/echo`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use futures_util::future::BoxFuture;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use weblane::config::{load_config, ConfigWatcher};
use weblane::http::HttpModule;
use weblane::lifecycle::{wait_for_signal, Shutdown};
use weblane::observability::{init_logging, metrics};
use weblane::{App, HandlerResult, HttpContext, WebConfig};

#[derive(Parser)]
#[command(name = "weblane")]
#[command(about = "Request lifecycle engine demo server", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

fn index(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { ctx.write_string("hello from weblane\n") })
}

fn session(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let body = json!({ "session_id": ctx.session_id(), "path": ctx.path() });
        ctx.write_json(&body)
    })
}

fn echo(ctx: &mut HttpContext) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let socket = ctx.websocket()?;
        while let Some(message) = socket.read_message().await? {
            socket.send_message(&message).await?;
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WebConfig::default(),
    };
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        gzip = config.server.enabled_gzip,
        sessions = config.session.enabled,
        "weblane starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let static_dir = config.server.static_dir.clone();
    let mut app = App::new(config.clone())
        .get("/", index)
        .get("/session", session)
        .websocket("/ws/echo", echo)
        .use_module(HttpModule::new().on_begin(|ctx| {
            tracing::trace!(method = %ctx.method(), path = %ctx.path(), "begin request");
            Ok(())
        }))
        .set_exception_handler(|ctx, fault| {
            tracing::warn!(url = %ctx.url(), panic = fault.is_panic(), "request failed");
            if let Some(sink) = ctx.response_mut() {
                if !sink.header_written() {
                    sink.write_header(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        });
    if let Some(dir) = static_dir {
        app = app.serve_files("/static/{*filepath}", dir);
    }
    let server = app.build()?;

    // Without a watcher the sender is dropped and the update task exits at once.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(err) = wait_for_signal().await {
            tracing::error!(error = %err, "Failed to listen for shutdown signals");
        }
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
