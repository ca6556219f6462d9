//! Mock implementations for testing
//!
//! Provides a scripted in-memory [`Connector`], a recording [`Subscriber`]
//! and small async helpers so session behaviour can be tested under paused
//! tokio time without a network.

use crate::config::SyncConfig;
use crate::protocol::{Record, SessionTarget, SyncEvent, Topic};
use crate::session::Subscriber;
use crate::transport::websocket::CloseInfo;
use crate::transport::{Connector, Frame, Link, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Configuration pointing at a fake backend with keepalive and read timeout disabled
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::with_base_url("ws://backend.test:8080");
    config.transport.read_timeout_secs = 0;
    config.transport.ping_interval_secs = 0;
    config
}

/// What the mock backend does with the next handshake for a topic
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Accept,
    Reject(TransportError),
    /// Never completes; only cancellation ends it
    Hang,
}

enum Inbound {
    Frame(Frame),
    Fail(TransportError),
    End,
}

#[derive(Default)]
struct LiveCounts {
    live: HashMap<Topic, usize>,
    max_live: HashMap<Topic, usize>,
}

/// Counts a connection as live from handshake start until it is dropped
struct LiveGuard {
    topic: Topic,
    counts: Arc<Mutex<LiveCounts>>,
}

impl LiveGuard {
    fn new(topic: Topic, counts: Arc<Mutex<LiveCounts>>) -> Self {
        {
            let mut guard = counts.lock().unwrap();
            let live = guard.live.entry(topic).or_default();
            *live += 1;
            let live = *live;
            let max = guard.max_live.entry(topic).or_default();
            *max = (*max).max(live);
        }
        Self { topic, counts }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let mut guard = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(live) = guard.live.get_mut(&self.topic) {
            *live = live.saturating_sub(1);
        }
    }
}

/// Scripted connector; accepts every handshake unless told otherwise
#[derive(Default)]
pub struct MockConnector {
    attempts: Mutex<Vec<SessionTarget>>,
    scripts: Mutex<HashMap<Topic, VecDeque<MockBehavior>>>,
    servers: Mutex<HashMap<Topic, Vec<MockServer>>>,
    counts: Arc<Mutex<LiveCounts>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue behaviours for the topic's next handshakes; once the queue is
    /// empty every handshake is accepted
    pub fn script(&self, topic: Topic, behaviors: impl IntoIterator<Item = MockBehavior>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(topic)
            .or_default()
            .extend(behaviors);
    }

    /// Every handshake attempted so far, in order
    pub fn attempts(&self) -> Vec<SessionTarget> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, topic: Topic) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|target| target.topic == topic)
            .count()
    }

    /// Backend side of the topic's most recent accepted connection
    pub fn server(&self, topic: Topic) -> Option<MockServer> {
        self.servers
            .lock()
            .unwrap()
            .get(&topic)
            .and_then(|servers| servers.last().cloned())
    }

    pub fn servers(&self, topic: Topic) -> Vec<MockServer> {
        self.servers
            .lock()
            .unwrap()
            .get(&topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Connections for `topic` currently handshaking or holding a link
    pub fn live(&self, topic: Topic) -> usize {
        self.counts
            .lock()
            .unwrap()
            .live
            .get(&topic)
            .copied()
            .unwrap_or_default()
    }

    /// Highest value [`live`](Self::live) has reached for `topic`
    pub fn max_live(&self, topic: Topic) -> usize {
        self.counts
            .lock()
            .unwrap()
            .max_live
            .get(&topic)
            .copied()
            .unwrap_or_default()
    }

    fn next_behavior(&self, topic: Topic) -> MockBehavior {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&topic)
            .and_then(VecDeque::pop_front)
            .unwrap_or(MockBehavior::Accept)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn Link>, TransportError> {
        self.attempts.lock().unwrap().push(target.clone());
        let guard = LiveGuard::new(target.topic, self.counts.clone());

        match self.next_behavior(target.topic) {
            MockBehavior::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let server = MockServer {
                    target: target.clone(),
                    inbound: tx,
                    sent: Arc::new(Mutex::new(Vec::new())),
                    pings: Arc::new(Mutex::new(0)),
                    answers_pings: Arc::new(AtomicBool::new(true)),
                    closed_by_client: Arc::new(AtomicBool::new(false)),
                };
                let link = MockLink {
                    inbound: rx,
                    server: server.clone(),
                    _guard: guard,
                };
                self.servers
                    .lock()
                    .unwrap()
                    .entry(target.topic)
                    .or_default()
                    .push(server);
                Ok(Box::new(link))
            }
            MockBehavior::Reject(error) => Err(error),
            MockBehavior::Hang => {
                let _guard = guard;
                std::future::pending().await
            }
        }
    }
}

/// Backend side of one mock connection
#[derive(Clone)]
pub struct MockServer {
    target: SessionTarget,
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    pings: Arc<Mutex<usize>>,
    answers_pings: Arc<AtomicBool>,
    closed_by_client: Arc<AtomicBool>,
}

impl MockServer {
    /// Target the client presented during the handshake
    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.inbound.send(Inbound::Frame(Frame::Text(text.to_string())));
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    pub fn send_frame(&self, frame: Frame) {
        let _ = self.inbound.send(Inbound::Frame(frame));
    }

    /// Send a close frame with `code`
    pub fn close(&self, code: u16, reason: &str) {
        self.send_frame(Frame::Close(Some(CloseInfo {
            code,
            reason: reason.to_string(),
        })));
    }

    /// Break the stream with a transport error
    pub fn fail(&self, message: &str) {
        let _ = self
            .inbound
            .send(Inbound::Fail(TransportError::ConnectionLost(message.to_string())));
    }

    /// End the stream without a close frame
    pub fn end(&self) {
        let _ = self.inbound.send(Inbound::End);
    }

    /// Text frames the client sent
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn pings(&self) -> usize {
        *self.pings.lock().unwrap()
    }

    /// Stop replying to keepalive pings with a pong, like a dead peer
    pub fn stop_answering_pings(&self) {
        self.answers_pings.store(false, Ordering::SeqCst);
    }

    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

struct MockLink {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    server: MockServer,
    _guard: LiveGuard,
}

#[async_trait]
impl Link for MockLink {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        match self.inbound.recv().await {
            Some(Inbound::Frame(frame)) => Some(Ok(frame)),
            Some(Inbound::Fail(error)) => Some(Err(error)),
            Some(Inbound::End) | None => None,
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.server.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        *self.server.pings.lock().unwrap() += 1;
        if self.server.answers_pings.load(Ordering::SeqCst) {
            self.server.send_frame(Frame::Pong);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.server.closed_by_client.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Subscriber that records every callback as a [`SyncEvent`]
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self, topic: Topic) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Status { topic: t, connected } if t == topic => Some(connected),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self, topic: Topic) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Error { topic: t, message } if t == topic => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn data(&self, topic: Topic) -> Vec<Record> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Data { topic: t, payload } if t == topic => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Subscriber for RecordingSubscriber {
    fn on_data_received(&self, topic: Topic, payload: &Record) {
        self.push(SyncEvent::Data {
            topic,
            payload: payload.clone(),
        });
    }

    fn on_connection_status_changed(&self, topic: Topic, connected: bool) {
        self.push(SyncEvent::Status { topic, connected });
    }

    fn on_error(&self, topic: Topic, message: &str) {
        self.push(SyncEvent::Error {
            topic,
            message: message.to_string(),
        });
    }
}

/// Let spawned tasks run until they are all waiting on something
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}
