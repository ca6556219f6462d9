//! Pure state transitions and reconnection logic for topic connections
//!
//! This module contains pure functions for the connection state machine,
//! reconnection decision making and per-topic health reporting.

use super::connection::{ConnectionState, ReconnectConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Events that drive a connection's state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Transport handshake initiated
    HandshakeStarted,
    /// Handshake completed
    HandshakeSucceeded,
    /// Clean close started, locally or by the backend
    CloseRequested,
    /// Clean close finished
    CloseCompleted,
    /// Network error, handshake rejection or abnormal remote close
    TransportFailure(String),
}

/// Decision result for reconnection
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectionDecision {
    /// Schedule (or, at fire time, perform) a new attempt
    Proceed { delay: Duration },
    /// Intentional or clean closes never reconnect
    AbortIntentionalClose,
    /// The session was disconnected or refreshed since the failure
    AbortSessionInactive,
}

/// Pure reconnection and state transition logic
pub struct ReconnectPolicy;

impl ReconnectPolicy {
    /// Next state after `event`; invalid transitions leave the state unchanged (pure function)
    pub fn determine_next_state(
        current: ConnectionState,
        event: &ConnectionEvent,
    ) -> ConnectionState {
        use ConnectionState::*;

        if current.is_terminal() {
            return current;
        }

        match (current, event) {
            (_, ConnectionEvent::TransportFailure(_)) if current != Idle => Failed,
            (Idle, ConnectionEvent::HandshakeStarted) => Connecting,
            (Connecting, ConnectionEvent::HandshakeSucceeded) => Open,
            (Idle, ConnectionEvent::CloseRequested) => Closed,
            (Connecting | Open, ConnectionEvent::CloseRequested) => Closing,
            (Closing, ConnectionEvent::CloseCompleted) => Closed,
            _ => {
                debug!(from = %current, event = ?event, "Ignoring invalid connection transition");
                current
            }
        }
    }

    /// Decide what to do when a connection reaches a terminal state (pure function)
    pub fn should_attempt_reconnection(
        terminal: ConnectionState,
        session_connected: bool,
        config: &ReconnectConfig,
    ) -> ReconnectionDecision {
        if terminal != ConnectionState::Failed {
            return ReconnectionDecision::AbortIntentionalClose;
        }
        if !session_connected {
            return ReconnectionDecision::AbortSessionInactive;
        }
        ReconnectionDecision::Proceed {
            delay: config.delay,
        }
    }

    /// Re-check a scheduled retry when its timer fires (pure function)
    ///
    /// The session may have been disconnected, or disconnected and connected
    /// again, during the delay; both suppress the retry.
    pub fn should_fire_retry(
        session_connected: bool,
        scheduled_epoch: u64,
        current_epoch: u64,
    ) -> ReconnectionDecision {
        if session_connected && scheduled_epoch == current_epoch {
            ReconnectionDecision::Proceed {
                delay: Duration::ZERO,
            }
        } else {
            ReconnectionDecision::AbortSessionInactive
        }
    }

    /// When the inbound side of an open connection counts as dead (pure function)
    ///
    /// With keepalive pings the limit runs from the oldest ping that no
    /// inbound frame has followed yet, so an idle peer that answers pings
    /// never expires. Without pings it runs from the last inbound frame.
    pub fn read_deadline(
        read_timeout: Option<Duration>,
        keepalive: bool,
        last_inbound: Instant,
        unanswered_ping: Option<Instant>,
    ) -> Option<Instant> {
        let limit = read_timeout?;
        if keepalive {
            unanswered_ping.map(|sent| sent + limit)
        } else {
            Some(last_inbound + limit)
        }
    }

    /// Check if the connection state allows sending (pure function)
    pub fn can_send(state: ConnectionState) -> bool {
        matches!(state, ConnectionState::Open)
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(topic: &str, from: ConnectionState, to: ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Open) => {
                info!(topic, "Connection established");
            }
            (ConnectionState::Open, ConnectionState::Failed) => {
                warn!(topic, "Connection lost");
            }
            (_, ConnectionState::Failed) => {
                warn!(topic, from = %from, "Connection failed");
            }
            (_, ConnectionState::Closed) => {
                info!(topic, "Connection closed");
            }
            _ => {
                debug!(topic, "Connection state: {} -> {}", from, to);
            }
        }
    }
}

/// Health snapshot for one topic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicHealth {
    pub state: String,
    /// Retries that actually fired since the last `connect()`
    pub reconnect_count: u32,
    /// When the current connection opened, if it is open
    pub connected_since: Option<DateTime<Utc>>,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub frames_received: u64,
    pub decode_failures: u64,
}

impl TopicHealth {
    /// Time the current connection has been open (pure function)
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.connected_since
            .and_then(|since| (now - since).to_std().ok())
    }

    /// Open and has heard from the backend within `max_silence` (pure function)
    pub fn is_healthy(&self, now: DateTime<Utc>, max_silence: Duration) -> bool {
        if self.connected_since.is_none() {
            return false;
        }
        match self.last_frame_at {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|silence| silence < max_silence)
                .unwrap_or(true),
        }
    }
}
