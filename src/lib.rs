//! weblane: request lifecycle engine for Axum-based web applications.
//!
//! ```text
//!     Client ──▶ front door ──▶ router ──▶ pipeline ──────────────▶ Client
//!                 │ upgrade?     │          │ pool lease
//!                 │ offline?     │          │ gzip / session / hijack
//!                 │ Server hdr   │          │ pre-hooks → handler → post-hooks
//!                 │              │          │ fault barrier + error record
//!                 │              │          └ access log, release
//!                 │              └─ files (ServeDir)
//!                 └─ websocket routes (one handler call per connection)
//!
//!   Cross-cutting: config (toml + watcher), observability (tracing, metrics,
//!   counters), admin API, lifecycle (signals, shutdown)
//! ```
//!
//! ```no_run
//! use weblane::{App, WebConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = App::new(WebConfig::default())
//!     .get("/", |ctx| Box::pin(async move { ctx.write_string("hello") }))
//!     .build()?;
//! let app = server.router();
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod session;

pub use app::{App, ServerCore, ServerError};
pub use config::WebConfig;
pub use http::{HandlerError, HandlerResult, HttpContext, HttpModule, HttpServer};
pub use lifecycle::Shutdown;
