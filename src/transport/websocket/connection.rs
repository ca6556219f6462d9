//! Pure connection state management for topic streams
//!
//! This module contains the connection state machine's states, transport
//! errors, the reconnection configuration and endpoint construction.

use crate::config::SyncConfig;
use crate::protocol::SessionTarget;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

/// Close reason sent when the session closes a stream on purpose
pub const CLOSE_REASON: &str = "Service disconnecting";

/// Query parameter carrying the tenant routing key
pub const TENANT_QUERY_PARAM: &str = "tenant";

/// Lifecycle of a single connection
///
/// `Idle -> Connecting -> Open -> {Closing -> Closed | Failed}`. `Closed`
/// and `Failed` are terminal; a connection that reaches them is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, handshake not started
    Idle,
    /// Handshake in flight
    Connecting,
    /// Handshake complete, frames flowing
    Open,
    /// Clean close in progress
    Closing,
    /// Closed cleanly
    Closed,
    /// Ended abnormally
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Holding or negotiating transport resources
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Reconnection configuration
///
/// Fixed delay, no backoff growth, no attempt limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

impl From<&SyncConfig> for ReconnectConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            delay: config.reconnect_delay(),
        }
    }
}

/// Transport-level failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Access token is not a valid header value")]
    InvalidHeader,
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("Handshake timed out after {0}s")]
    HandshakeTimeout(u64),
    #[error("Handshake rejected with HTTP status {status}")]
    Rejected { status: u16 },
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("No frames received for {0}s")]
    ReadTimeout(u64),
    #[error("Connection closed abnormally (code {code}): {reason}")]
    AbnormalClose { code: u16, reason: String },
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Endpoint construction for topic streams
pub struct EndpointBuilder;

impl EndpointBuilder {
    /// `{base}{topic path}?tenant={tenant}`
    ///
    /// Any path on the base URL is kept as a prefix and existing query
    /// parameters are preserved.
    pub fn target_url(target: &SessionTarget) -> Result<Url, TransportError> {
        let mut url = Url::parse(&target.base_url)
            .map_err(|_| TransportError::InvalidBaseUrl(target.base_url.clone()))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(TransportError::InvalidBaseUrl(target.base_url.clone()));
        }

        let path = format!(
            "{}{}",
            url.path().trim_end_matches('/'),
            target.topic.endpoint_path()
        );
        url.set_path(&path);
        url.query_pairs_mut()
            .append_pair(TENANT_QUERY_PARAM, &target.tenant_id);

        Ok(url)
    }

    /// `Bearer {token}`, flagged sensitive so it is never printed by `http`
    pub fn authorization_value(token: &str) -> Result<HeaderValue, TransportError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| TransportError::InvalidHeader)?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Full handshake request for `target`
    pub fn build_request(target: &SessionTarget) -> Result<Request, TransportError> {
        let url = Self::target_url(target)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidBaseUrl(format!("{url}: {e}")))?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, Self::authorization_value(&target.access_token)?);
        Ok(request)
    }
}
