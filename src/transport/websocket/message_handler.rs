//! Pure frame routing and decoding for topic streams
//!
//! This module contains pure functions that turn WebSocket messages into
//! transport-neutral [`Frame`]s and classify frames into routing decisions.

use crate::protocol::{decode_record, Record};
use bytes::Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Close status reported when a close frame carries no code
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Code and reason carried by a close frame
#[derive(Debug, Clone, PartialEq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// Transport-neutral inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping,
    Pong,
    Close(Option<CloseInfo>),
}

/// Routing decisions for inbound frames
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRoute {
    /// Text frame decoded into a record
    Record(Record),
    /// Text frame that is not a JSON object; the stream stays open
    DecodeFailed { message: String, raw: String },
    /// The backend closed with a normal closure
    RemoteClosedCleanly { reason: String },
    /// The backend closed with any other code
    RemoteClosedAbnormally { code: u16, reason: String },
    /// Keepalive or binary traffic (handled automatically)
    Ignored(&'static str),
}

/// Pure frame routing decisions
pub struct MessageHandler;

impl MessageHandler {
    /// Convert a tungstenite message into a [`Frame`] (pure function)
    ///
    /// Raw frames only appear when writing and are dropped.
    pub fn frame_from_message(message: Message) -> Option<Frame> {
        match message {
            Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(Frame::Binary(data)),
            Message::Ping(_) => Some(Frame::Ping),
            Message::Pong(_) => Some(Frame::Pong),
            Message::Close(frame) => Some(Frame::Close(frame.map(|f| CloseInfo {
                code: u16::from(f.code),
                reason: f.reason.as_str().to_owned(),
            }))),
            Message::Frame(_) => None,
        }
    }

    /// Classify an inbound frame (pure function)
    pub fn route_frame(frame: Frame) -> FrameRoute {
        match frame {
            Frame::Text(text) => match decode_record(&text) {
                Ok(record) => FrameRoute::Record(record),
                Err(message) => FrameRoute::DecodeFailed { message, raw: text },
            },
            Frame::Binary(data) => {
                debug!(bytes = data.len(), "Ignoring binary frame");
                FrameRoute::Ignored("binary")
            }
            Frame::Ping => FrameRoute::Ignored("ping"),
            Frame::Pong => FrameRoute::Ignored("pong"),
            Frame::Close(info) => Self::route_close(info),
        }
    }

    fn route_close(info: Option<CloseInfo>) -> FrameRoute {
        let (code, reason) = match info {
            Some(CloseInfo { code, reason }) => (code, reason),
            None => (NO_STATUS_RECEIVED, String::new()),
        };

        if Self::is_clean_close(code) {
            FrameRoute::RemoteClosedCleanly { reason }
        } else {
            FrameRoute::RemoteClosedAbnormally { code, reason }
        }
    }

    /// Only a normal closure (1000) counts as clean (pure function)
    pub fn is_clean_close(code: u16) -> bool {
        code == u16::from(CloseCode::Normal)
    }
}
