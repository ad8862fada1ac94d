//! Direct access to the underlying connection for streaming routes.
//!
//! The handle is taken from the request before the handler runs. The
//! connection only becomes available after the handler has answered with
//! `101 Switching Protocols`, so handlers move the handle into a task:
//!
//! ```ignore
//! let conn = ctx.take_hijacked().expect("streaming route");
//! ctx.write_header(StatusCode::SWITCHING_PROTOCOLS)?;
//! tokio::spawn(async move {
//!     if let Ok(mut io) = conn.upgraded().await {
//!         let _ = io.write_all(b"hello").await;
//!     }
//! });
//! ```

use std::fmt;

use axum::http::request::Parts;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use thiserror::Error;

/// Why a connection could not be hijacked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HijackError {
    #[error("connection does not support hijacking")]
    Unsupported,
}

/// A claim on the raw connection of the current request.
pub struct HijackedConn {
    on_upgrade: OnUpgrade,
}

impl HijackedConn {
    pub(crate) fn take(parts: &mut Parts) -> Result<Self, HijackError> {
        parts
            .extensions
            .remove::<OnUpgrade>()
            .map(|on_upgrade| Self { on_upgrade })
            .ok_or(HijackError::Unsupported)
    }

    /// Wait for the response to be sent and take over the connection.
    pub async fn upgraded(self) -> Result<TokioIo<Upgraded>, hyper::Error> {
        self.on_upgrade.await.map(TokioIo::new)
    }
}

impl fmt::Debug for HijackedConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HijackedConn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn plain_requests_cannot_be_hijacked() {
        let (mut parts, ()) = Request::new(()).into_parts();
        assert_eq!(HijackedConn::take(&mut parts).unwrap_err(), HijackError::Unsupported);
    }
}
