//! Topics, wire records and session events
//!
//! This module defines the closed set of backend topics and the event
//! structures that flow from a topic's connection to its subscriber.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
