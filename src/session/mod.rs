//! Multiplexed topic session
//!
//! # Architecture
//!
//! - [`manager`] - Public control surface and its builder
//! - [`registry`] - Connected Flag, connection-per-topic and subscriber-per-topic maps
//! - [`dispatcher`] - Per-topic FIFO delivery to subscribers
//! - `shared` - Lock-held registry mutations and worker reports
//! - `worker` - One task per connection: handshake, frame pump, close
//! - `scheduler` - Cancellable reconnection timers
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topic_sync::config::SyncConfig;
//! use topic_sync::protocol::{Record, Topic};
//! use topic_sync::providers::StaticCredentials;
//! use topic_sync::session::{SessionManager, Subscriber};
//!
//! struct Printer;
//!
//! impl Subscriber for Printer {
//!     fn on_data_received(&self, topic: Topic, payload: &Record) {
//!         println!("{topic}: {payload:?}");
//!     }
//!     fn on_connection_status_changed(&self, topic: Topic, connected: bool) {
//!         println!("{topic} connected={connected}");
//!     }
//!     fn on_error(&self, topic: Topic, message: &str) {
//!         eprintln!("{topic}: {message}");
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SessionManager::builder(SyncConfig::with_base_url("ws://10.0.2.2:8080"))
//!     .with_credentials(Arc::new(StaticCredentials::new("token")))
//!     .build()?;
//!
//! let printer = Arc::new(Printer);
//! manager.register_subscriber(Topic::Analytics, &printer);
//! manager.connect();
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod manager;
pub mod registry;
mod scheduler;
mod shared;
mod worker;

pub use dispatcher::Subscriber;
pub use manager::{SessionManager, SessionManagerBuilder};
pub use registry::SubscriberTable;
