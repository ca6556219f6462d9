//! Error types for the topic sync session
//!
//! Control operations on the session manager never fail for the runtime
//! failure classes (transport loss, undecodable frames, sends while offline);
//! those are reported to subscribers or logged. [`SyncError`] covers setup
//! and the typed results of the lower layers.

use crate::protocol::UnknownTopic;
use crate::transport::websocket::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for the sync crate
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error(transparent)]
    InvalidTopic(#[from] UnknownTopic),

    #[error("No credential provider configured")]
    MissingCredentials,

    #[error("No tokio runtime available; call from within a runtime or supply a handle")]
    NoRuntime,
}

impl SyncError {
    /// Create decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Message safe to hand to a subscriber
    pub fn subscriber_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

const MAX_MESSAGE_LEN: usize = 500;
const TRUNCATE_SUFFIX: &str = "...[truncated]";

static BEARER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+").expect("bearer pattern is valid")
});

static SECRET_PAIR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*[^\s&]+").expect("secret pattern is valid")
});

/// Redact credentials and bound the length of messages that leave the crate
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = BEARER_PATTERN.replace_all(message, "Bearer ***");
    let mut sanitized = SECRET_PAIR_PATTERN
        .replace_all(&sanitized, "${1}=***")
        .to_string();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN - TRUNCATE_SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATE_SUFFIX);
    }

    sanitized
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
