//! Topic Sync - multiplexed real-time topic session
//!
//! Keeps one authenticated, tenant-scoped streaming connection open per
//! topic (`analytics`, `clusters`, `system`) to a backend, decodes inbound
//! JSON records and hands them to the subscriber registered for the topic.
//! Connections that fail are retried after a fixed delay for as long as the
//! session stays connected.
//!
//! # Overview
//!
//! - [`session::SessionManager`] - connect, disconnect, refresh, send, subscribe
//! - [`transport`] - handshake seam and the WebSocket implementation
//! - [`providers`] - where tokens and tenant ids come from
//! - [`config`] - TOML configuration
//!
//! # Quick Start
//!
//! ```rust
//! use topic_sync::protocol::{decode_record, Topic};
//!
//! let topic: Topic = "/analytics".parse().unwrap();
//! assert_eq!(topic, Topic::Analytics);
//!
//! let record = decode_record(r#"{"total_sessions":5}"#).unwrap();
//! assert_eq!(record["total_sessions"], 5);
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod providers;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use protocol::*;
pub use providers::{
    CredentialProvider, EnvCredentials, StaticCredentials, TenantContext, TenantProvider,
};
pub use session::{SessionManager, SessionManagerBuilder, Subscriber};
pub use transport::websocket::{ConnectionState, TopicHealth, TransportError};
