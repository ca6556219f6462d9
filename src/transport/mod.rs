//! Transport layer for topic streams
//!
//! This module provides the handshake abstraction used by the session and
//! its WebSocket implementation. The session only ever talks to a
//! [`Connector`] and the [`Link`]s it hands back, which lets tests script
//! the backend without a network.

use crate::protocol::SessionTarget;

pub mod websocket;

pub use websocket::{Frame, TransportError};

/// Performs the transport-level handshake for one topic
///
/// Every call produces a brand-new link; links are never reused across
/// reconnections.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a stream to `target`, presenting its tenant and bearer token
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn Link>, TransportError>;
}

/// One open, single-use streaming connection
#[async_trait::async_trait]
pub trait Link: Send {
    /// Next inbound frame; `None` once the stream has ended
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Send one text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a keepalive ping
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Close cleanly (normal closure)
    async fn close(&mut self) -> Result<(), TransportError>;
}
