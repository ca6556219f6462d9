//! Connection worker
//!
//! One task per connection. It waits for the topic's previous connection to
//! finish, performs the handshake, then pumps frames until it is cancelled,
//! the backend closes, or the transport fails. Every outcome is reported to
//! [`SessionShared`], which owns the events and retries that follow.

use super::shared::SessionShared;
use crate::protocol::{SessionTarget, Topic};
use crate::transport::websocket::{
    ConnectionEvent, ConnectionState, FrameRoute, MessageHandler, ReconnectPolicy, TransportError,
};
use crate::transport::{Connector, Frame, Link};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn, Instrument};
use uuid::Uuid;

/// Upper bound on a local close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply `event` to a connection's state and log the transition
pub(crate) fn advance(
    topic: Topic,
    state: &watch::Sender<ConnectionState>,
    event: &ConnectionEvent,
) -> ConnectionState {
    let from = *state.borrow();
    let to = ReconnectPolicy::determine_next_state(from, event);
    if to != from {
        state.send_replace(to);
        ReconnectPolicy::log_state_transition(topic.as_str(), from, to);
    }
    to
}

enum Outcome {
    Cancelled,
    RemoteClosed { reason: String },
    Failed(TransportError),
}

pub(crate) struct ConnectionWorker {
    pub topic: Topic,
    pub id: Uuid,
    pub target: SessionTarget,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub cancel: CancellationToken,
    pub predecessors: Vec<watch::Receiver<ConnectionState>>,
    pub connector: Arc<dyn Connector>,
    pub shared: Weak<SessionShared>,
    pub read_timeout: Option<Duration>,
    pub ping_interval: Option<Duration>,
}

impl ConnectionWorker {
    pub async fn run(self) {
        let span = crate::connection_span!(topic = %self.topic, connection_id = %self.id);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) {
        if !self.await_predecessors().await {
            self.advance(&ConnectionEvent::CloseRequested);
            return;
        }

        self.advance(&ConnectionEvent::HandshakeStarted);
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.connector.connect(&self.target) => Some(result),
        };

        let mut link = match connected {
            None => {
                trace!("Cancelled during handshake");
                self.advance(&ConnectionEvent::CloseRequested);
                self.advance(&ConnectionEvent::CloseCompleted);
                return;
            }
            Some(Err(e)) => {
                self.report_failure(e);
                return;
            }
            Some(Ok(link)) => link,
        };

        let opened = match self.shared.upgrade() {
            Some(shared) => shared.on_open(self.topic, self.id, &self.state),
            None => false,
        };
        if !opened {
            self.close_link(link).await;
            return;
        }

        let outcome = self.pump(link.as_mut()).await;
        if let Outcome::Cancelled = outcome {
            self.close_link(link).await;
            return;
        }

        // Release the transport before the state turns terminal so a
        // successor never overlaps with it
        drop(link);
        match outcome {
            Outcome::RemoteClosed { reason } => match self.shared.upgrade() {
                Some(shared) => shared.on_remote_close(self.topic, self.id, &self.state, &reason),
                None => {
                    self.advance(&ConnectionEvent::CloseRequested);
                    self.advance(&ConnectionEvent::CloseCompleted);
                }
            },
            Outcome::Failed(e) => self.report_failure(e),
            Outcome::Cancelled => {}
        }
    }

    fn advance(&self, event: &ConnectionEvent) -> ConnectionState {
        advance(self.topic, &self.state, event)
    }

    /// Wait until every earlier connection for the topic is terminal;
    /// false if this connection was cancelled meanwhile
    async fn await_predecessors(&mut self) -> bool {
        let predecessors = std::mem::take(&mut self.predecessors);
        for mut previous in predecessors {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                _ = wait_terminal(&mut previous) => {}
            }
        }
        !self.cancel.is_cancelled()
    }

    fn report_failure(&self, failure: TransportError) {
        match self.shared.upgrade() {
            Some(shared) => shared.on_failure(self.topic, self.id, &self.state, failure),
            None => {
                self.advance(&ConnectionEvent::TransportFailure(failure.to_string()));
            }
        }
    }

    async fn close_link(&self, mut link: Box<dyn Link>) {
        self.advance(&ConnectionEvent::CloseRequested);
        match tokio::time::timeout(CLOSE_TIMEOUT, link.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
            Err(_) => warn!("Close handshake timed out"),
        }
        drop(link);
        self.advance(&ConnectionEvent::CloseCompleted);
    }

    async fn pump(&mut self, link: &mut dyn Link) -> Outcome {
        let mut ping = self
            .ping_interval
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));
        let keepalive = ping.is_some();
        let mut last_inbound = Instant::now();
        let mut unanswered_ping: Option<Instant> = None;

        loop {
            let read_deadline = ReconnectPolicy::read_deadline(
                self.read_timeout,
                keepalive,
                last_inbound,
                unanswered_ping,
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                Some(text) = self.outbound.recv() => {
                    if let Err(e) = link.send_text(text).await {
                        return Outcome::Failed(e);
                    }
                }
                _ = tick(&mut ping) => {
                    if let Err(e) = link.ping().await {
                        return Outcome::Failed(e);
                    }
                    unanswered_ping.get_or_insert_with(Instant::now);
                }
                _ = sleep_until(read_deadline) => {
                    let secs = self.read_timeout.map(|t| t.as_secs()).unwrap_or_default();
                    return Outcome::Failed(TransportError::ReadTimeout(secs));
                }
                frame = link.next_frame() => {
                    let frame = match frame {
                        None => {
                            return Outcome::Failed(TransportError::ConnectionLost(
                                "stream ended without a close frame".to_string(),
                            ))
                        }
                        Some(Err(e)) => return Outcome::Failed(e),
                        Some(Ok(frame)) => frame,
                    };
                    last_inbound = Instant::now();
                    unanswered_ping = None;
                    if let Some(outcome) = self.handle_frame(frame) {
                        return outcome;
                    }
                }
            }
        }
    }

    fn handle_frame(&self, frame: Frame) -> Option<Outcome> {
        match MessageHandler::route_frame(frame) {
            FrameRoute::Record(record) => {
                if let Some(shared) = self.shared.upgrade() {
                    shared.on_record(self.topic, self.id, record);
                }
                None
            }
            FrameRoute::DecodeFailed { message, raw } => {
                if let Some(shared) = self.shared.upgrade() {
                    shared.on_decode_failure(self.topic, self.id, &raw, message);
                }
                None
            }
            FrameRoute::RemoteClosedCleanly { reason } => Some(Outcome::RemoteClosed { reason }),
            FrameRoute::RemoteClosedAbnormally { code, reason } => {
                Some(Outcome::Failed(TransportError::AbnormalClose { code, reason }))
            }
            FrameRoute::Ignored(kind) => {
                trace!(kind, "Ignoring frame");
                None
            }
        }
    }
}

async fn wait_terminal(rx: &mut watch::Receiver<ConnectionState>) {
    // An error means the sender is gone, so the connection has ended
    let _ = rx.wait_for(|state| state.is_terminal()).await;
}

async fn tick(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
