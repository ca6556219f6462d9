//! WebSocket transport for topic streams
//!
//! This module separates pure functions from I/O operations for better
//! testability.
//!
//! # Architecture
//!
//! - [`connection`] - Pure connection state, errors and endpoint construction
//! - [`message_handler`] - Pure frame classification and decoding
//! - [`health_monitor`] - Pure state transitions and reconnection decisions
//! - [`client`] - Impure I/O on top of tokio-tungstenite
//!
//! # Usage
//!
//! ```rust,no_run
//! use topic_sync::protocol::{SessionTarget, Topic};
//! use topic_sync::transport::{Connector, websocket::WsConnector};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let connector = WsConnector::new(Duration::from_secs(30));
//! let target = SessionTarget {
//!     topic: Topic::Analytics,
//!     base_url: "ws://localhost:8080".to_string(),
//!     tenant_id: "default".to_string(),
//!     access_token: "token".to_string(),
//! };
//! let mut link = connector.connect(&target).await?;
//! let frame = link.next_frame().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

pub use client::{WsConnector, WsLink};
pub use connection::{
    ConnectionState, EndpointBuilder, ReconnectConfig, TransportError, CLOSE_REASON,
};
pub use health_monitor::{ConnectionEvent, ReconnectionDecision, ReconnectPolicy, TopicHealth};
pub use message_handler::{CloseInfo, Frame, FrameRoute, MessageHandler};
