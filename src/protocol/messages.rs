//! Wire records and session events
//!
//! Inbound frames are whole JSON text documents; each one must decode to a
//! JSON object on its own. Decoded records and connection status changes are
//! carried to subscribers as [`SyncEvent`]s.

use super::topics::Topic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded inbound frame: one self-contained JSON object
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Everything needed to open one topic's stream
///
/// Recomputed from the credential and tenant providers every time a
/// connection is built; never stored beyond the connection that used it.
#[derive(Clone, PartialEq)]
pub struct SessionTarget {
    pub topic: Topic,
    pub base_url: String,
    pub tenant_id: String,
    pub access_token: String,
}

// Keep the bearer token out of logs and panic messages.
impl fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTarget")
            .field("topic", &self.topic)
            .field("base_url", &self.base_url)
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"***")
            .finish()
    }
}

/// Event delivered to the subscriber registered for a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A frame decoded into a record
    Data { topic: Topic, payload: Record },
    /// The topic's connection opened (`true`) or went away (`false`)
    Status { topic: Topic, connected: bool },
    /// Transport failure or undecodable frame
    Error { topic: Topic, message: String },
}

impl SyncEvent {
    pub fn topic(&self) -> Topic {
        match self {
            SyncEvent::Data { topic, .. }
            | SyncEvent::Status { topic, .. }
            | SyncEvent::Error { topic, .. } => *topic,
        }
    }
}

/// Decode a text frame into a [`Record`]
///
/// Anything other than a single JSON object is a decode failure.
pub fn decode_record(text: &str) -> Result<Record, String> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "JSON parsing error: expected an object, found {}",
            json_kind(&other)
        )),
        Err(e) => Err(format!("JSON parsing error: {e}")),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
