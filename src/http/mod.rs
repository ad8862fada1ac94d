//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, peer address, tracing)
//!     → front_door.rs (upgrade detection, offline check, Server header)
//!     → router match
//!     → pipeline.rs (pool lease, gzip, session, hooks, handler, fault barrier)
//!        or files.rs (static files)
//!     → response.rs (status, headers, buffered body)
//!     → Send to client
//! ```

pub mod access_log;
pub mod context;
pub mod fault;
pub mod files;
pub mod front_door;
pub mod gzip;
pub mod handler;
pub mod hijack;
pub mod pipeline;
pub mod response;
pub mod server;
pub mod websocket;

pub use context::HttpContext;
pub use fault::{Fault, HandlerError, HandlerResult};
pub use handler::{handle, ExceptionHandle, HttpHandle, HttpModule};
pub use hijack::{HijackError, HijackedConn};
pub use pipeline::TransportMode;
pub use response::{Cookie, ResponseSink};
pub use server::HttpServer;
pub use websocket::WebSocket;
