//! Topic registry
//!
//! Holds the session's mutable shared state: the Connected Flag, the current
//! connection per topic, connections still shutting down, pending retries
//! and health counters. All of it lives behind the session mutex; nothing
//! here performs I/O or blocks.
//!
//! Subscribers live in a separate [`SubscriberTable`] so the dispatcher can
//! resolve them without touching the session mutex.

use super::dispatcher::Subscriber;
use crate::protocol::Topic;
use crate::transport::websocket::{ConnectionState, TopicHealth};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Registry entry for one connection
pub(crate) struct ConnectionHandle {
    pub id: Uuid,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub outbound: mpsc::UnboundedSender<String>,
    pub cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

/// A reconnection timer that has not fired yet
pub(crate) struct PendingRetry {
    pub id: u64,
    pub epoch: u64,
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub(crate) struct HealthRecord {
    pub reconnect_count: u32,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub frames_received: u64,
    pub decode_failures: u64,
}

impl HealthRecord {
    pub fn snapshot(&self, state: ConnectionState) -> TopicHealth {
        TopicHealth {
            state: state.to_string(),
            reconnect_count: self.reconnect_count,
            connected_since: self.connected_since,
            last_frame_at: self.last_frame_at,
            frames_received: self.frames_received,
            decode_failures: self.decode_failures,
        }
    }
}

#[derive(Default)]
pub(crate) struct TopicRegistry {
    /// `connect()` called without a matching `disconnect()`
    pub connected: bool,
    /// Bumped by every `connect()`; retries from earlier sessions never fire
    pub epoch: u64,
    connections: HashMap<Topic, ConnectionHandle>,
    retiring: HashMap<Topic, Vec<watch::Receiver<ConnectionState>>>,
    retries: HashMap<Topic, PendingRetry>,
    health: HashMap<Topic, HealthRecord>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, topic: Topic) -> Option<&ConnectionHandle> {
        self.connections.get(&topic)
    }

    /// Whether `id` is still the connection the registry holds for `topic`
    pub fn is_current(&self, topic: Topic, id: Uuid) -> bool {
        self.connections
            .get(&topic)
            .is_some_and(|handle| handle.id == id)
    }

    /// State of the topic's current connection, `Idle` when there is none
    pub fn state_of(&self, topic: Topic) -> ConnectionState {
        self.connections
            .get(&topic)
            .map(ConnectionHandle::current_state)
            .unwrap_or(ConnectionState::Idle)
    }

    /// Make `handle` the topic's current connection
    ///
    /// Returns the state receivers of every earlier connection for the topic
    /// that has not reached a terminal state; the new connection must wait
    /// for all of them before starting its handshake.
    pub fn install(
        &mut self,
        topic: Topic,
        handle: ConnectionHandle,
    ) -> Vec<watch::Receiver<ConnectionState>> {
        let mut predecessors = self.retiring.remove(&topic).unwrap_or_default();
        if let Some(previous) = self.connections.insert(topic, handle) {
            previous.cancel.cancel();
            predecessors.push(previous.state.subscribe());
        }
        predecessors.retain(|rx| !rx.borrow().is_terminal());
        predecessors
    }

    /// Detach every current connection, keeping their state receivers so
    /// later connections can wait for them to finish closing
    pub fn retire_all(&mut self) -> Vec<(Topic, ConnectionHandle)> {
        let retired: Vec<_> = self.connections.drain().collect();
        for (topic, handle) in &retired {
            let waiting = self.retiring.entry(*topic).or_default();
            waiting.retain(|rx| !rx.borrow().is_terminal());
            waiting.push(handle.state.subscribe());
        }
        retired
    }

    /// Record a pending retry, cancelling any earlier one for the topic
    pub fn set_retry(&mut self, topic: Topic, retry: PendingRetry) {
        if let Some(previous) = self.retries.insert(topic, retry) {
            previous.cancel.cancel();
        }
    }

    /// Remove the pending retry for `topic` if it is the one identified by `id`
    pub fn take_retry(&mut self, topic: Topic, id: u64) -> Option<PendingRetry> {
        match self.retries.get(&topic) {
            Some(retry) if retry.id == id => self.retries.remove(&topic),
            _ => None,
        }
    }

    pub fn take_retries(&mut self) -> Vec<PendingRetry> {
        self.retries.drain().map(|(_, retry)| retry).collect()
    }

    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    pub fn health_mut(&mut self, topic: Topic) -> &mut HealthRecord {
        self.health.entry(topic).or_default()
    }

    pub fn health(&self, topic: Topic) -> TopicHealth {
        let state = self.state_of(topic);
        self.health
            .get(&topic)
            .map(|record| record.snapshot(state))
            .unwrap_or_else(|| HealthRecord::default().snapshot(state))
    }

    /// Zero the reconnect counters at the start of a session
    pub fn reset_reconnect_counts(&mut self) {
        for record in self.health.values_mut() {
            record.reconnect_count = 0;
        }
    }
}

/// Subscriber-per-topic map
///
/// Holds weak references: the registry never keeps a subscriber alive, and a
/// dropped subscriber behaves exactly like an unregistered one.
#[derive(Default)]
pub struct SubscriberTable {
    inner: Mutex<HashMap<Topic, Weak<dyn Subscriber>>>,
}

impl SubscriberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever subscriber was registered for `topic`
    pub fn register(&self, topic: Topic, subscriber: Weak<dyn Subscriber>) {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        table.insert(topic, subscriber);
    }

    pub fn unregister(&self, topic: Topic) -> bool {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        table.remove(&topic).is_some()
    }

    /// Live subscriber for `topic`, pruning the entry if it has been dropped
    pub fn lookup(&self, topic: Topic) -> Option<Arc<dyn Subscriber>> {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let subscriber = table.get(&topic)?.upgrade();
        if subscriber.is_none() {
            table.remove(&topic);
        }
        subscriber
    }
}
