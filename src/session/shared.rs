//! Session state shared between the manager, connection workers and timers
//!
//! Every mutation of the registry happens here, under one mutex, in short
//! synchronous critical sections. Workers report what their link did; this
//! module decides whether the report still matters (the connection may have
//! been superseded) and which events and retries follow from it.

use super::dispatcher::EventDispatcher;
use super::registry::{ConnectionHandle, PendingRetry, SubscriberTable, TopicRegistry};
use super::scheduler::ReconnectScheduler;
use super::worker::{advance, ConnectionWorker};
use crate::config::SyncConfig;
use crate::error::{sanitize_error_message, SyncError};
use crate::protocol::{Record, SessionTarget, SyncEvent, Topic};
use crate::providers::{CredentialProvider, TenantProvider};
use crate::transport::websocket::{
    ConnectionEvent, ConnectionState, ReconnectConfig, ReconnectPolicy, ReconnectionDecision,
    TopicHealth, TransportError,
};
use crate::transport::Connector;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) struct SessionShared {
    me: Weak<SessionShared>,
    registry: Mutex<TopicRegistry>,
    subscribers: Arc<SubscriberTable>,
    dispatcher: EventDispatcher,
    scheduler: ReconnectScheduler,
    config: SyncConfig,
    reconnect: ReconnectConfig,
    credentials: Arc<dyn CredentialProvider>,
    tenant: Arc<dyn TenantProvider>,
    connector: Arc<dyn Connector>,
    runtime: Handle,
}

impl SessionShared {
    pub fn new(
        config: SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
        tenant: Arc<dyn TenantProvider>,
        connector: Arc<dyn Connector>,
        runtime: Handle,
        delivery: Handle,
    ) -> Arc<Self> {
        let subscribers = Arc::new(SubscriberTable::new());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry: Mutex::new(TopicRegistry::new()),
            dispatcher: EventDispatcher::new(&delivery, subscribers.clone()),
            subscribers,
            scheduler: ReconnectScheduler::new(runtime.clone()),
            reconnect: ReconnectConfig::from(&config),
            config,
            credentials,
            tenant,
            connector,
            runtime,
        })
    }

    fn lock(&self) -> MutexGuard<'_, TopicRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribers(&self) -> &SubscriberTable {
        &self.subscribers
    }

    pub fn credentials(&self) -> &dyn CredentialProvider {
        self.credentials.as_ref()
    }

    /// Snapshot the providers into a target for `topic`
    ///
    /// Called with the registry lock held, so the values read are the ones
    /// current after any teardown in the same critical section.
    fn build_target(&self, topic: Topic) -> SessionTarget {
        SessionTarget {
            topic,
            base_url: self.config.backend.base_url.clone(),
            tenant_id: self.tenant.current_tenant_id(),
            access_token: self.credentials.current_access_token(),
        }
    }

    // ---- control operations ----

    pub fn connect(&self) -> bool {
        let mut registry = self.lock();
        self.connect_locked(&mut registry)
    }

    pub fn disconnect(&self) {
        let mut registry = self.lock();
        self.disconnect_locked(&mut registry);
    }

    /// Disconnect then connect under one lock; the new targets are read
    /// after the old connections have been retired
    pub fn refresh(&self) -> bool {
        if !self.credentials.is_authenticated() {
            warn!("Not authenticated, skipping connection refresh");
            return false;
        }
        let mut registry = self.lock();
        self.disconnect_locked(&mut registry);
        self.connect_locked(&mut registry);
        true
    }

    fn connect_locked(&self, registry: &mut TopicRegistry) -> bool {
        if registry.connected {
            debug!("Session already connected, ignoring connect");
            return false;
        }

        registry.connected = true;
        registry.epoch += 1;
        registry.reset_reconnect_counts();
        info!(
            epoch = registry.epoch,
            base_url = %self.config.backend.base_url,
            "Connecting all topics"
        );

        for topic in Topic::ALL {
            let target = self.build_target(topic);
            self.start_connection_locked(registry, target);
        }
        true
    }

    fn disconnect_locked(&self, registry: &mut TopicRegistry) {
        let was_connected = registry.connected;
        registry.connected = false;
        self.dispatcher.retire_pending();

        for retry in registry.take_retries() {
            retry.cancel.cancel();
        }

        for (topic, handle) in registry.retire_all() {
            if handle.current_state() == ConnectionState::Open {
                self.dispatcher.enqueue(SyncEvent::Status {
                    topic,
                    connected: false,
                });
            }
            registry.health_mut(topic).connected_since = None;
            handle.cancel.cancel();
        }

        if was_connected {
            info!("Disconnected all topics");
        } else {
            debug!("Disconnect called while not connected");
        }
    }

    /// Create a connection for `target.topic`, register it as current and
    /// spawn its worker
    fn start_connection_locked(&self, registry: &mut TopicRegistry, target: SessionTarget) {
        let topic = target.topic;
        let id = Uuid::new_v4();
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let state = Arc::new(state_tx);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let predecessors = registry.install(
            topic,
            ConnectionHandle {
                id,
                state: state.clone(),
                outbound: outbound_tx,
                cancel: cancel.clone(),
            },
        );

        debug!(
            topic = %topic,
            connection_id = %id,
            tenant = %target.tenant_id,
            waiting_for = predecessors.len(),
            "Starting connection"
        );

        let worker = ConnectionWorker {
            topic,
            id,
            target,
            state,
            outbound: outbound_rx,
            cancel,
            predecessors,
            connector: self.connector.clone(),
            shared: self.me.clone(),
            read_timeout: self.config.transport.read_timeout(),
            ping_interval: self.config.transport.ping_interval(),
        };
        self.runtime.spawn(worker.run());
    }

    pub fn send(&self, topic: Topic, payload: String) -> bool {
        let registry = self.lock();
        match registry.current(topic) {
            Some(handle) if ReconnectPolicy::can_send(handle.current_state()) => {
                handle.outbound.send(payload).is_ok()
            }
            _ => {
                warn!(
                    topic = %topic,
                    state = %registry.state_of(topic),
                    "No open connection, dropping outbound message"
                );
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn connection_state(&self, topic: Topic) -> ConnectionState {
        self.lock().state_of(topic)
    }

    pub fn health(&self, topic: Topic) -> TopicHealth {
        self.lock().health(topic)
    }

    pub fn pending_retries(&self) -> usize {
        self.lock().pending_retries()
    }

    // ---- worker reports ----

    /// Handshake succeeded; returns false if the connection was superseded
    pub fn on_open(
        &self,
        topic: Topic,
        id: Uuid,
        state: &watch::Sender<ConnectionState>,
    ) -> bool {
        let mut registry = self.lock();
        if !registry.is_current(topic, id) {
            debug!(topic = %topic, connection_id = %id, "Handshake finished for superseded connection");
            return false;
        }

        advance(topic, state, &ConnectionEvent::HandshakeSucceeded);
        registry.health_mut(topic).connected_since = Some(Utc::now());
        self.dispatcher.enqueue(SyncEvent::Status {
            topic,
            connected: true,
        });
        true
    }

    pub fn on_record(&self, topic: Topic, id: Uuid, record: Record) {
        let mut registry = self.lock();
        if !registry.is_current(topic, id) {
            return;
        }

        let health = registry.health_mut(topic);
        health.frames_received += 1;
        health.last_frame_at = Some(Utc::now());
        self.dispatcher.enqueue(SyncEvent::Data {
            topic,
            payload: record,
        });
    }

    /// Undecodable frame; the connection stays open
    pub fn on_decode_failure(&self, topic: Topic, id: Uuid, raw: &str, message: String) {
        let mut registry = self.lock();
        if !registry.is_current(topic, id) {
            return;
        }

        error!(topic = %topic, raw = %raw, "{}", message);
        let health = registry.health_mut(topic);
        health.decode_failures += 1;
        health.last_frame_at = Some(Utc::now());
        self.dispatcher.enqueue(SyncEvent::Error {
            topic,
            message: SyncError::decode(message).subscriber_message(),
        });
    }

    /// Backend closed with a normal closure; no reconnection
    pub fn on_remote_close(
        &self,
        topic: Topic,
        id: Uuid,
        state: &watch::Sender<ConnectionState>,
        reason: &str,
    ) {
        let mut registry = self.lock();
        let was_open = *state.borrow() == ConnectionState::Open;
        advance(topic, state, &ConnectionEvent::CloseRequested);
        advance(topic, state, &ConnectionEvent::CloseCompleted);

        if !registry.is_current(topic, id) {
            return;
        }

        info!(topic = %topic, reason = %sanitize_error_message(reason), "Backend closed the stream");
        registry.health_mut(topic).connected_since = None;
        if was_open {
            self.dispatcher.enqueue(SyncEvent::Status {
                topic,
                connected: false,
            });
        }
    }

    /// Transport failure: report it, then consult the reconnection policy
    pub fn on_failure(
        &self,
        topic: Topic,
        id: Uuid,
        state: &watch::Sender<ConnectionState>,
        failure: TransportError,
    ) {
        let mut registry = self.lock();
        let next = advance(
            topic,
            state,
            &ConnectionEvent::TransportFailure(failure.to_string()),
        );

        if !registry.is_current(topic, id) {
            debug!(topic = %topic, connection_id = %id, error = %failure, "Superseded connection failed");
            return;
        }

        registry.health_mut(topic).connected_since = None;
        self.dispatcher.enqueue(SyncEvent::Error {
            topic,
            message: SyncError::from(failure).subscriber_message(),
        });
        self.dispatcher.enqueue(SyncEvent::Status {
            topic,
            connected: false,
        });

        match ReconnectPolicy::should_attempt_reconnection(next, registry.connected, &self.reconnect)
        {
            ReconnectionDecision::Proceed { delay } => {
                let epoch = registry.epoch;
                let me = self.me.clone();
                let retry = self.scheduler.schedule(delay, move |retry_id| {
                    if let Some(shared) = me.upgrade() {
                        shared.fire_retry(topic, retry_id);
                    }
                });
                info!(topic = %topic, delay_ms = delay.as_millis() as u64, "Scheduling reconnection");
                registry.set_retry(
                    topic,
                    PendingRetry {
                        id: retry.id,
                        epoch,
                        cancel: retry.cancel,
                    },
                );
            }
            decision => {
                debug!(topic = %topic, ?decision, "Not reconnecting");
            }
        }
    }

    /// Timer callback: re-check the session and open a new connection
    fn fire_retry(&self, topic: Topic, retry_id: u64) {
        let mut registry = self.lock();
        let Some(retry) = registry.take_retry(topic, retry_id) else {
            debug!(topic = %topic, retry_id, "Retry no longer pending");
            return;
        };

        match ReconnectPolicy::should_fire_retry(registry.connected, retry.epoch, registry.epoch) {
            ReconnectionDecision::Proceed { .. } => {
                let health = registry.health_mut(topic);
                health.reconnect_count += 1;
                info!(topic = %topic, attempt = health.reconnect_count, "Reconnecting");
                let target = self.build_target(topic);
                self.start_connection_locked(&mut registry, target);
            }
            decision => {
                debug!(topic = %topic, ?decision, "Dropping stale retry");
            }
        }
    }
}
