//! Session manager: the public face of the sync session
//!
//! Control operations are synchronous, cheap and callable from any thread.
//! They only mutate the registry and spawn or cancel tasks; handshakes,
//! closes and reconnect delays all happen on the session runtime.

use super::dispatcher::Subscriber;
use super::shared::SessionShared;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::Topic;
use crate::providers::{CredentialProvider, TenantContext, TenantProvider};
use crate::transport::websocket::{ConnectionState, TopicHealth, WsConnector};
use crate::transport::Connector;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Owns one connection per [`Topic`] to the streaming backend
///
/// Dropping the manager disconnects every topic.
pub struct SessionManager {
    shared: Arc<SessionShared>,
}

impl SessionManager {
    pub fn builder(config: SyncConfig) -> SessionManagerBuilder {
        SessionManagerBuilder::new(config)
    }

    /// Open a connection for every topic
    ///
    /// Returns `false` without doing anything if the session is already
    /// connected. Success means the connections were started, not that any
    /// handshake has completed.
    pub fn connect(&self) -> bool {
        let _span = crate::session_span!(operation = "connect").entered();
        self.shared.connect()
    }

    /// Close every connection and cancel every pending reconnection
    ///
    /// Idempotent. Subscribers of topics that were open receive
    /// `connected = false`.
    pub fn disconnect(&self) {
        let _span = crate::session_span!(operation = "disconnect").entered();
        self.shared.disconnect()
    }

    /// Rebuild every connection with the current token and tenant
    ///
    /// Skipped, returning `false`, when the credential provider reports that
    /// no one is authenticated.
    pub fn refresh_connections(&self) -> bool {
        let _span = crate::session_span!(operation = "refresh").entered();
        self.shared.refresh()
    }

    /// Queue `payload` as a text frame on the topic's open connection
    ///
    /// Nothing is buffered: without an open connection the payload is
    /// dropped with a warning and `false` is returned.
    pub fn send<S: Into<String>>(&self, topic: Topic, payload: S) -> bool {
        self.shared.send(topic, payload.into())
    }

    /// Route the topic's events to `subscriber`, replacing any previous one
    ///
    /// Only a weak reference is kept; once the caller drops its `Arc` the
    /// topic behaves as if nothing were registered.
    pub fn register_subscriber<S>(&self, topic: Topic, subscriber: &Arc<S>)
    where
        S: Subscriber + 'static,
    {
        let subscriber: Arc<dyn Subscriber> = subscriber.clone();
        self.shared
            .subscribers()
            .register(topic, Arc::downgrade(&subscriber));
        debug!(topic = %topic, "Subscriber registered");
    }

    pub fn unregister_subscriber(&self, topic: Topic) {
        if self.shared.subscribers().unregister(topic) {
            debug!(topic = %topic, "Subscriber unregistered");
        }
    }

    /// The Connected Flag
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// State of the topic's current connection (`Idle` if there is none)
    pub fn connection_state(&self, topic: Topic) -> ConnectionState {
        self.shared.connection_state(topic)
    }

    pub fn health(&self, topic: Topic) -> TopicHealth {
        self.shared.health(topic)
    }

    pub fn health_snapshot(&self) -> BTreeMap<Topic, TopicHealth> {
        Topic::ALL
            .into_iter()
            .map(|topic| (topic, self.shared.health(topic)))
            .collect()
    }

    /// Reconnection timers that have been scheduled but have not fired
    pub fn pending_retries(&self) -> usize {
        self.shared.pending_retries()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.shared.is_connected() {
            info!("Session manager dropped while connected, disconnecting");
            self.shared.disconnect();
        }
    }
}

/// Builder for [`SessionManager`]
pub struct SessionManagerBuilder {
    config: SyncConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
    tenant: Option<Arc<dyn TenantProvider>>,
    connector: Option<Arc<dyn Connector>>,
    runtime: Option<Handle>,
    delivery: Option<Handle>,
}

impl SessionManagerBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            credentials: None,
            tenant: None,
            connector: None,
            runtime: None,
            delivery: None,
        }
    }

    /// Required: the source of bearer tokens
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Defaults to a [`TenantContext`] seeded from the `[tenant]` section
    pub fn with_tenant(mut self, tenant: Arc<dyn TenantProvider>) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Defaults to [`WsConnector`] with the configured handshake timeout
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Runtime for connection workers and timers (defaults to the current one)
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Runtime subscriber callbacks run on (defaults to the session runtime)
    pub fn with_delivery_handle(mut self, delivery: Handle) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn build(self) -> SyncResult<SessionManager> {
        self.config.validate()?;

        let credentials = self.credentials.ok_or(SyncError::MissingCredentials)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| SyncError::NoRuntime)?,
        };
        let delivery = self.delivery.unwrap_or_else(|| runtime.clone());
        let tenant: Arc<dyn TenantProvider> = match self.tenant {
            Some(tenant) => tenant,
            None => Arc::new(TenantContext::new(self.config.initial_tenant_id())),
        };
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector::from(&self.config.transport)),
        };

        info!(
            base_url = %self.config.backend.base_url,
            delay_ms = self.config.reconnect.delay_ms,
            "Session manager created"
        );

        Ok(SessionManager {
            shared: SessionShared::new(
                self.config,
                credentials,
                tenant,
                connector,
                runtime,
                delivery,
            ),
        })
    }
}
