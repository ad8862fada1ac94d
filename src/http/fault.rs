//! Errors raised inside a request and the faults recovered from them.

use std::any::Any;
use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

/// Error returned by handlers and hooks.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("body error: {0}")]
    Body(#[from] axum::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),

    #[error("no response sink bound to this context")]
    NoResponse,

    #[error("no websocket bound to this context")]
    NoWebSocket,

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Result type for handlers and hooks.
pub type HandlerResult = Result<(), HandlerError>;

/// Displayable panic payload.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    /// The original value passed to `panic!`.
    pub fn payload(&self) -> &(dyn Any + Send) {
        self.0.as_ref()
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

impl fmt::Debug for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicMessage").field(&self.to_string()).finish()
    }
}

/// Everything the per-request fault barrier can catch.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("panic: {0}")]
    Panic(PanicMessage),

    #[error("handler error: {0}")]
    Handler(#[source] HandlerError),

    #[error("hook error: {0}")]
    Hook(#[source] HandlerError),

    #[error("gzip setup failed: {0}")]
    Transcode(#[source] std::io::Error),
}

impl Fault {
    /// Panic payload, when the fault was a panic.
    pub fn panic_payload(&self) -> Option<&(dyn Any + Send)> {
        match self {
            Fault::Panic(message) => Some(message.payload()),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Fault::Panic(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            Fault::Panic(_) => "panic",
            Fault::Handler(_) => "handler",
            Fault::Hook(_) => "hook",
            Fault::Transcode(_) => "transcode",
        }
    }

    /// One-line diagnostic, prefixed with where the fault was caught.
    pub fn diagnostic(&self, location: &str) -> String {
        let detail = match self {
            Fault::Panic(message) => message.to_string(),
            Fault::Handler(err) | Fault::Hook(err) => err.to_string(),
            Fault::Transcode(err) => err.to_string(),
        };
        format!("{location} [{}] {detail}", self.kind())
    }
}
