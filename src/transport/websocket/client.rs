//! Impure I/O operations for the WebSocket transport
//!
//! This module performs the handshake and frame I/O on top of
//! tokio-tungstenite. Every decision about what a frame means lives in
//! [`MessageHandler`]; this layer only moves bytes.

use super::connection::{EndpointBuilder, TransportError, CLOSE_REASON};
use super::message_handler::{Frame, MessageHandler};
use crate::config::TransportSection;
use crate::protocol::SessionTarget;
use crate::transport::{Connector, Link};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// How long a local close waits for the backend's close reply
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Production [`Connector`] that opens one WebSocket per call
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Map a handshake error to the transport taxonomy (pure function)
    fn map_handshake_error(error: WsError) -> TransportError {
        match error {
            WsError::Http(response) => TransportError::Rejected {
                status: response.status().as_u16(),
            },
            other => TransportError::HandshakeFailed(other.to_string()),
        }
    }
}

impl From<&TransportSection> for WsConnector {
    fn from(section: &TransportSection) -> Self {
        Self::new(section.connect_timeout())
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn Link>, TransportError> {
        let request = EndpointBuilder::build_request(target)?;
        debug!(
            topic = %target.topic,
            tenant = %target.tenant_id,
            uri = %request.uri(),
            "Opening WebSocket"
        );

        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::HandshakeTimeout(self.connect_timeout.as_secs()))?
            .map_err(Self::map_handshake_error)?;

        info!(
            topic = %target.topic,
            status = response.status().as_u16(),
            "WebSocket handshake complete"
        );

        Ok(Box::new(WsLink::new(stream)))
    }
}

/// One open WebSocket stream
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsLink {
    pub fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Link for WsLink {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(message) => {
                    if let Some(frame) = MessageHandler::frame_from_message(message) {
                        return Some(Ok(frame));
                    }
                }
                Err(WsError::ConnectionClosed) => return None,
                Err(e) => return Some(Err(TransportError::ConnectionLost(e.to_string()))),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: CLOSE_REASON.into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            return match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => Ok(()),
                other => Err(TransportError::SendFailed(other.to_string())),
            };
        }

        // Read until the backend echoes the close so the TCP stream ends cleanly
        let drained = tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, async {
            while let Some(message) = self.stream.next().await {
                if message.is_err() {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Backend did not acknowledge close within {:?}", CLOSE_DRAIN_TIMEOUT);
        }
        Ok(())
    }
}
