//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! request cookies
//!     → binder.rs (read lock on the installed manager)
//!     → manager.rs (resolve the presented id, or mint one)
//!     → HttpContext::session_id (+ Set-Cookie when minted)
//! ```
//!
//! # Design Decisions
//! - Only identifiers are handled here; session data belongs to the store
//! - Manager initialization happens once, under the write lock, at startup
//! - The check-then-mint sequence is not serialized per client

pub mod binder;
pub mod manager;

pub use binder::SessionBinder;
pub use manager::{CookieSessionManager, SessionError, SessionManager};
