//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! request pipeline produces:
//!     → state.rs (process-wide request/error counters)
//!     → metrics.rs (counters and latency histogram, mirrored from state)
//!     → logging.rs (subscriber for `http_server` / `http_request` targets)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//!     → admin API (`/admin/state`)
//! ```
//!
//! # Design Decisions
//! - Counters are owned by the server core and passed explicitly, no globals
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod state;

pub use logging::{init_logging, LOG_TARGET_HTTP_REQUEST, LOG_TARGET_HTTP_SERVER};
pub use state::{ServerState, StateSnapshot};
