//! WebSocket handle exposed to handlers.
//!
//! # Responsibilities
//! - Wrap the upgraded socket attached to a WebSocket-mode context
//! - Text-oriented helpers for the common echo/chat style handlers
//!
//! # Design Decisions
//! - One handler invocation per connection, not per message
//! - Ping/pong handled transparently by the socket
//! - A close frame or end of stream reads as `None`

use std::fmt;

use axum::extract::ws::{Message, WebSocket as RawWebSocket};

use crate::http::fault::{HandlerError, HandlerResult};

/// The upgraded connection of a WebSocket-mode request.
pub struct WebSocket {
    socket: RawWebSocket,
}

impl WebSocket {
    pub fn new(socket: RawWebSocket) -> Self {
        Self { socket }
    }

    /// Next text message. Binary frames are decoded lossily; `None` once the
    /// peer closes.
    pub async fn read_message(&mut self) -> Result<Option<String>, HandlerError> {
        while let Some(message) = self.socket.recv().await {
            match message? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(data) => return Ok(Some(String::from_utf8_lossy(&data).into_owned())),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
        Ok(None)
    }

    pub async fn send_message(&mut self, text: &str) -> HandlerResult {
        self.socket.send(Message::Text(text.to_owned().into())).await?;
        Ok(())
    }

    /// Raw socket for frame-level access.
    pub fn socket_mut(&mut self) -> &mut RawWebSocket {
        &mut self.socket
    }

    pub fn into_inner(self) -> RawWebSocket {
        self.socket
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket").finish_non_exhaustive()
    }
}
