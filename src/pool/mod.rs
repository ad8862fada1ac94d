//! Per-request object pooling.
//!
//! # Data Flow
//! ```text
//! request arrives
//!     → arena.rs (pop a recycled object or build a new one)
//!     → Pooled<T> guard owned by the request
//!     → guard dropped on any exit path
//!     → Recycle::recycle clears references
//!     → object pushed back onto the free list
//! ```
//!
//! # Design Decisions
//! - Pure cache: no upper bound, an empty free list just allocates
//! - Release is tied to guard drop, so it happens exactly once even when the
//!   request future is cancelled
//! - Objects are cleared on release and fully reset by the next tenant

pub mod arena;

pub use arena::{Pool, PoolStats, Pooled, Recycle};

use std::sync::Arc;

use serde::Serialize;

use crate::http::context::HttpContext;
use crate::http::response::ResponseSink;

/// The two arenas used by the request pipeline.
#[derive(Debug, Default)]
pub struct ResourcePool {
    responses: Arc<Pool<ResponseSink>>,
    contexts: Arc<Pool<HttpContext>>,
}

/// Snapshot of both arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourcePoolStats {
    pub responses: PoolStats,
    pub contexts: PoolStats,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a response sink; it is returned when the guard drops.
    pub fn acquire_response(&self) -> Pooled<ResponseSink> {
        self.responses.acquire()
    }

    /// Take a request context; it is returned when the guard drops.
    pub fn acquire_context(&self) -> Pooled<HttpContext> {
        self.contexts.acquire()
    }

    pub fn stats(&self) -> ResourcePoolStats {
        ResourcePoolStats {
            responses: self.responses.stats(),
            contexts: self.contexts.stats(),
        }
    }
}
