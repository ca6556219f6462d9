//! Session behaviour tests
//!
//! Drive a real `SessionManager` against the scripted in-memory connector
//! with paused tokio time, so reconnect delays elapse instantly and
//! deterministically.

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use topic_sync::config::{SyncConfig, TransportSection};
use topic_sync::providers::{StaticCredentials, TenantContext, TenantProvider};
use topic_sync::testing::{
    settle, test_config, MockBehavior, MockConnector, RecordingSubscriber,
};
use topic_sync::{ConnectionState, SessionManager, Topic, TransportError};

struct Harness {
    manager: SessionManager,
    connector: Arc<MockConnector>,
    credentials: Arc<StaticCredentials>,
    tenant: Arc<TenantContext>,
    subscriber: Arc<RecordingSubscriber>,
}

fn harness_with(config: SyncConfig) -> Harness {
    let connector = Arc::new(MockConnector::new());
    let credentials = Arc::new(StaticCredentials::new("token-1"));
    let tenant = Arc::new(TenantContext::default());
    let manager = SessionManager::builder(config)
        .with_credentials(credentials.clone())
        .with_tenant(tenant.clone())
        .with_connector(connector.clone())
        .build()
        .unwrap();

    let subscriber = RecordingSubscriber::new();
    for topic in Topic::ALL {
        manager.register_subscriber(topic, &subscriber);
    }

    Harness {
        manager,
        connector,
        credentials,
        tenant,
        subscriber,
    }
}

fn harness() -> Harness {
    harness_with(test_config())
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

fn rejected() -> MockBehavior {
    MockBehavior::Reject(TransportError::Rejected { status: 503 })
}

#[tokio::test(start_paused = true)]
async fn test_connect_opens_every_topic() {
    let h = harness();

    assert!(h.manager.connect());
    assert!(h.manager.is_connected());
    settle().await;

    for topic in Topic::ALL {
        assert_eq!(h.manager.connection_state(topic), ConnectionState::Open);
        assert_eq!(h.subscriber.statuses(topic), vec![true]);
        assert_eq!(h.connector.attempts_for(topic), 1);
    }

    let attempts = h.connector.attempts();
    assert!(attempts.iter().all(|t| t.access_token == "token-1"));
    assert!(attempts.iter().all(|t| t.tenant_id == "default"));
    assert!(attempts.iter().all(|t| t.base_url == "ws://backend.test:8080"));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_connect_is_noop() {
    let h = harness();

    assert!(h.manager.connect());
    settle().await;
    assert!(!h.manager.connect());
    settle().await;

    assert_eq!(h.connector.attempts().len(), 3);
    for topic in Topic::ALL {
        assert_eq!(h.subscriber.statuses(topic), vec![true]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_analytics_scenario() {
    let h = harness();
    h.manager.connect();
    settle().await;

    let server = h.connector.server(Topic::Analytics).unwrap();
    assert_eq!(server.target().topic, Topic::Analytics);
    server.send_json(json!({"total_sessions": 5}));
    settle().await;

    let data = h.subscriber.data(Topic::Analytics);
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["total_sessions"], json!(5));

    server.fail("connection reset by peer");
    settle().await;
    assert_eq!(h.subscriber.statuses(Topic::Analytics), vec![true, false]);
    assert_eq!(h.subscriber.errors(Topic::Analytics).len(), 1);
    assert_eq!(
        h.manager.connection_state(Topic::Analytics),
        ConnectionState::Failed
    );

    advance(Duration::from_millis(4_900)).await;
    assert_eq!(h.connector.attempts_for(Topic::Analytics), 1);

    advance(Duration::from_millis(200)).await;
    assert_eq!(h.connector.attempts_for(Topic::Analytics), 2);
    assert_eq!(
        h.subscriber.statuses(Topic::Analytics),
        vec![true, false, true]
    );
    assert_eq!(
        h.manager.connection_state(Topic::Analytics),
        ConnectionState::Open
    );
    assert_eq!(h.manager.health(Topic::Analytics).reconnect_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_reports_error_before_status() {
    let h = harness();
    h.manager.connect();
    settle().await;
    h.subscriber.clear();

    h.connector.server(Topic::System).unwrap().fail("reset");
    settle().await;

    let events = h.subscriber.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        topic_sync::SyncEvent::Error {
            topic: Topic::System,
            ..
        }
    ));
    assert!(matches!(
        events[1],
        topic_sync::SyncEvent::Status {
            topic: Topic::System,
            connected: false
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_decode_failure_keeps_connection_open() {
    let h = harness();
    h.manager.connect();
    settle().await;
    h.subscriber.clear();

    let server = h.connector.server(Topic::Clusters).unwrap();
    server.send_text("this is not json");
    settle().await;

    assert_eq!(h.subscriber.errors(Topic::Clusters).len(), 1);
    assert!(h.subscriber.statuses(Topic::Clusters).is_empty());
    assert_eq!(
        h.manager.connection_state(Topic::Clusters),
        ConnectionState::Open
    );

    server.send_json(json!({"clusters": [1, 2]}));
    settle().await;
    assert_eq!(h.subscriber.data(Topic::Clusters).len(), 1);

    advance(Duration::from_secs(30)).await;
    assert_eq!(h.connector.attempts_for(Topic::Clusters), 1);

    let health = h.manager.health(Topic::Clusters);
    assert_eq!(health.decode_failures, 1);
    assert_eq!(health.frames_received, 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_object_json_is_decode_failure() {
    let h = harness();
    h.manager.connect();
    settle().await;

    h.connector.server(Topic::Analytics).unwrap().send_text("[1, 2, 3]");
    settle().await;

    let errors = h.subscriber.errors(Topic::Analytics);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("JSON parsing error"), "{}", errors[0]);
}

#[tokio::test(start_paused = true)]
async fn test_system_failure_reconnects_exactly_once_after_delay() {
    let h = harness();
    h.manager.connect();
    settle().await;
    h.subscriber.clear();

    h.connector.server(Topic::System).unwrap().fail("reset");
    settle().await;

    assert_eq!(h.subscriber.statuses(Topic::System), vec![false]);
    assert_eq!(h.subscriber.errors(Topic::System).len(), 1);
    assert_eq!(h.manager.pending_retries(), 1);

    advance(Duration::from_millis(4_999)).await;
    assert_eq!(h.connector.attempts_for(Topic::System), 1);

    advance(Duration::from_millis(2)).await;
    assert_eq!(h.connector.attempts_for(Topic::System), 2);
    assert_eq!(h.manager.pending_retries(), 0);

    advance(Duration::from_secs(60)).await;
    assert_eq!(h.connector.attempts_for(Topic::System), 2);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_rejection_retries_without_limit() {
    let h = harness();
    h.connector
        .script(Topic::System, [rejected(), rejected(), rejected()]);
    h.manager.connect();
    settle().await;

    for expected in 2..=4 {
        advance(Duration::from_millis(5_001)).await;
        assert_eq!(h.connector.attempts_for(Topic::System), expected);
    }

    let errors = h.subscriber.errors(Topic::System);
    assert_eq!(errors.len(), 3);
    assert!(errors[0].contains("503"), "{}", errors[0]);
    assert_eq!(
        h.manager.connection_state(Topic::System),
        ConnectionState::Open
    );
    // Never opened, so no `true`, but every failure reports `false`
    assert_eq!(
        h.subscriber.statuses(Topic::System),
        vec![false, false, false, true]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_retry() {
    let h = harness();
    h.connector.script(Topic::System, [rejected()]);
    h.manager.connect();
    settle().await;
    assert_eq!(h.manager.pending_retries(), 1);

    h.manager.disconnect();
    assert_eq!(h.manager.pending_retries(), 0);

    advance(Duration::from_secs(30)).await;
    assert_eq!(h.connector.attempts_for(Topic::System), 1);
    assert!(!h.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_stale_retry_does_not_fire_into_new_session() {
    let h = harness();
    h.connector.script(Topic::System, [rejected()]);
    h.manager.connect();
    settle().await;

    h.manager.disconnect();
    h.manager.connect();
    settle().await;
    assert_eq!(h.connector.attempts_for(Topic::System), 2);

    advance(Duration::from_secs(30)).await;
    assert_eq!(h.connector.attempts_for(Topic::System), 2);
    assert!(h.connector.max_live(Topic::System) <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_links_and_reports_status() {
    let h = harness();
    h.manager.connect();
    settle().await;
    h.subscriber.clear();

    h.manager.disconnect();
    assert!(!h.manager.is_connected());
    settle().await;

    for topic in Topic::ALL {
        assert_eq!(h.subscriber.statuses(topic), vec![false]);
        assert!(h.subscriber.errors(topic).is_empty());
        assert!(h.connector.server(topic).unwrap().closed_by_client());
        assert_eq!(h.connector.live(topic), 0);
        assert_eq!(h.manager.connection_state(topic), ConnectionState::Idle);
    }

    // Idempotent
    h.manager.disconnect();
    settle().await;
    for topic in Topic::ALL {
        assert_eq!(h.subscriber.statuses(topic), vec![false]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake() {
    let h = harness();
    h.connector.script(Topic::Analytics, [MockBehavior::Hang]);
    h.manager.connect();
    settle().await;

    assert_eq!(
        h.manager.connection_state(Topic::Analytics),
        ConnectionState::Connecting
    );
    assert_eq!(h.connector.live(Topic::Analytics), 1);

    h.manager.disconnect();
    settle().await;

    assert_eq!(h.connector.live(Topic::Analytics), 0);
    assert!(h.subscriber.statuses(Topic::Analytics).is_empty());
    advance(Duration::from_secs(30)).await;
    assert_eq!(h.connector.attempts_for(Topic::Analytics), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_uses_current_token_and_tenant() {
    let h = harness();
    h.manager.connect();
    settle().await;

    h.credentials.set_token("token-2");
    h.tenant.set_tenant_id("acme");
    assert!(h.manager.refresh_connections());
    settle().await;

    assert!(h.manager.is_connected());
    for topic in Topic::ALL {
        let latest = h.connector.server(topic).unwrap();
        assert_eq!(latest.target().access_token, "token-2");
        assert_eq!(latest.target().tenant_id, "acme");
        assert_eq!(h.connector.attempts_for(topic), 2);
        assert!(h.connector.max_live(topic) <= 1);
        assert_eq!(h.manager.connection_state(topic), ConnectionState::Open);
        assert_eq!(h.subscriber.statuses(topic), vec![true, false, true]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skipped_when_not_authenticated() {
    let h = harness();
    h.manager.connect();
    settle().await;

    h.credentials.clear();
    assert!(!h.manager.refresh_connections());
    settle().await;

    for topic in Topic::ALL {
        assert_eq!(h.connector.attempts_for(topic), 1);
        assert_eq!(h.manager.connection_state(topic), ConnectionState::Open);
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_while_disconnected_is_dropped() {
    let h = harness();
    assert!(!h.manager.send(Topic::System, r#"{"cmd":"ping"}"#));

    h.connector.script(Topic::System, [MockBehavior::Hang]);
    h.manager.connect();
    settle().await;
    assert!(!h.manager.send(Topic::System, r#"{"cmd":"ping"}"#));
}

#[tokio::test(start_paused = true)]
async fn test_send_reaches_open_connection() {
    let h = harness();
    h.manager.connect();
    settle().await;

    assert!(h.manager.send(Topic::System, r#"{"cmd":"ping"}"#));
    assert!(h.manager.send(Topic::System, r#"{"cmd":"pong"}"#));
    settle().await;

    let server = h.connector.server(Topic::System).unwrap();
    assert_eq!(server.sent(), vec![r#"{"cmd":"ping"}"#, r#"{"cmd":"pong"}"#]);
    assert!(h.connector.server(Topic::Analytics).unwrap().sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_without_subscriber_are_dropped() {
    let h = harness();
    h.manager.unregister_subscriber(Topic::Analytics);
    h.manager.connect();
    settle().await;

    let server = h.connector.server(Topic::Analytics).unwrap();
    server.send_json(json!({"total_sessions": 1}));
    settle().await;
    assert!(h.subscriber.data(Topic::Analytics).is_empty());
    assert!(h.subscriber.statuses(Topic::Analytics).is_empty());

    // Nothing was buffered for a later subscriber
    h.manager
        .register_subscriber(Topic::Analytics, &h.subscriber);
    settle().await;
    assert!(h.subscriber.data(Topic::Analytics).is_empty());

    server.send_json(json!({"total_sessions": 2}));
    settle().await;
    assert_eq!(h.subscriber.data(Topic::Analytics).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_subscriber_is_not_kept_alive() {
    let h = harness();
    let temporary = RecordingSubscriber::new();
    h.manager.register_subscriber(Topic::Clusters, &temporary);
    let weak = Arc::downgrade(&temporary);
    drop(temporary);
    assert!(weak.upgrade().is_none());

    h.manager.connect();
    settle().await;
    h.connector
        .server(Topic::Clusters)
        .unwrap()
        .send_json(json!({"a": 1}));
    settle().await;

    // The replaced subscriber never sees anything either
    assert!(h.subscriber.data(Topic::Clusters).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_preserve_receipt_order() {
    let h = harness();
    h.manager.connect();
    settle().await;

    let server = h.connector.server(Topic::Analytics).unwrap();
    for i in 0..25 {
        server.send_json(json!({ "seq": i }));
        if i == 10 {
            server.send_text("garbage");
        }
    }
    settle().await;

    let seqs: Vec<i64> = h
        .subscriber
        .data(Topic::Analytics)
        .iter()
        .map(|r| r["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, (0..25).collect::<Vec<_>>());

    let events: Vec<_> = h
        .subscriber
        .events()
        .into_iter()
        .filter(|e| e.topic() == Topic::Analytics)
        .collect();
    let error_index = events
        .iter()
        .position(|e| matches!(e, topic_sync::SyncEvent::Error { .. }))
        .unwrap();
    // status(true), then seq 0..=10, then the decode error
    assert_eq!(error_index, 12);
}

#[tokio::test(start_paused = true)]
async fn test_clean_remote_close_does_not_reconnect() {
    let h = harness();
    h.manager.connect();
    settle().await;

    h.connector
        .server(Topic::Clusters)
        .unwrap()
        .close(1000, "maintenance");
    settle().await;

    assert_eq!(h.subscriber.statuses(Topic::Clusters), vec![true, false]);
    assert!(h.subscriber.errors(Topic::Clusters).is_empty());
    assert_eq!(
        h.manager.connection_state(Topic::Clusters),
        ConnectionState::Closed
    );

    advance(Duration::from_secs(30)).await;
    assert_eq!(h.connector.attempts_for(Topic::Clusters), 1);
    assert!(h.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_and_stream_end_reconnect() {
    let h = harness();
    h.manager.connect();
    settle().await;

    h.connector
        .server(Topic::Clusters)
        .unwrap()
        .close(1011, "internal error");
    h.connector.server(Topic::System).unwrap().end();
    settle().await;

    let errors = h.subscriber.errors(Topic::Clusters);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("1011"), "{}", errors[0]);
    assert_eq!(h.subscriber.errors(Topic::System).len(), 1);

    advance(Duration::from_millis(5_001)).await;
    assert_eq!(h.connector.attempts_for(Topic::Clusters), 2);
    assert_eq!(h.connector.attempts_for(Topic::System), 2);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_live_connection_per_topic_under_churn() {
    let h = harness();
    h.connector.script(Topic::System, [rejected(), rejected()]);

    for round in 0..10 {
        h.manager.connect();
        if round % 2 == 0 {
            settle().await;
        }
        if round % 3 == 0 {
            h.manager.refresh_connections();
        }
        h.manager.disconnect();
        if round % 4 == 0 {
            advance(Duration::from_secs(6)).await;
        }
    }
    h.manager.connect();
    advance(Duration::from_secs(20)).await;

    for topic in Topic::ALL {
        assert!(
            h.connector.max_live(topic) <= 1,
            "{topic} had {} live connections",
            h.connector.max_live(topic)
        );
        assert_eq!(h.connector.live(topic), 1);
        assert_eq!(h.manager.connection_state(topic), ConnectionState::Open);
    }
}

#[tokio::test(start_paused = true)]
async fn test_read_timeout_is_transport_failure() {
    let mut config = test_config();
    config.transport.read_timeout_secs = 30;
    let h = harness_with(config);
    h.manager.connect();
    settle().await;

    advance(Duration::from_secs(20)).await;
    h.connector
        .server(Topic::System)
        .unwrap()
        .send_json(json!({"alive": true}));
    settle().await;

    // Analytics and clusters have been silent for 31s, system for 11s
    advance(Duration::from_secs(11)).await;
    let errors = h.subscriber.errors(Topic::Analytics);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("No frames received"), "{}", errors[0]);
    assert!(h.subscriber.errors(Topic::System).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_pings() {
    let mut config = test_config();
    config.transport.ping_interval_secs = 10;
    let h = harness_with(config);
    h.manager.connect();
    settle().await;

    advance(Duration::from_secs(35)).await;
    assert_eq!(h.connector.server(Topic::System).unwrap().pings(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_default_transport_keeps_idle_streams_open() {
    let mut config = test_config();
    config.transport = TransportSection::default();
    let h = harness_with(config);
    h.manager.connect();
    settle().await;

    // No data at all, but the backend answers every keepalive ping
    advance(Duration::from_secs(125)).await;

    for topic in Topic::ALL {
        assert!(h.subscriber.errors(topic).is_empty(), "{topic} reported an error");
        assert_eq!(h.subscriber.statuses(topic), vec![true]);
        assert_eq!(h.connector.attempts_for(topic), 1);
        assert_eq!(h.manager.connection_state(topic), ConnectionState::Open);
    }
    assert_eq!(h.connector.server(Topic::System).unwrap().pings(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_ping_is_transport_failure() {
    let mut config = test_config();
    config.transport = TransportSection::default();
    let h = harness_with(config);
    h.manager.connect();
    settle().await;
    h.connector.server(Topic::System).unwrap().stop_answering_pings();

    // First ping goes out at 30s; the peer has until 60s to answer
    advance(Duration::from_secs(59)).await;
    assert!(h.subscriber.errors(Topic::System).is_empty());

    advance(Duration::from_secs(2)).await;
    let errors = h.subscriber.errors(Topic::System);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("No frames received for 30s"), "{}", errors[0]);
    assert_eq!(h.subscriber.statuses(Topic::System), vec![true, false]);
    assert!(h.subscriber.errors(Topic::Analytics).is_empty());
}

#[test]
fn test_refresh_discards_records_queued_for_old_tenant() {
    let session = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    // Subscriber callbacks only run while this runtime is driven
    let delivery = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let connector = Arc::new(MockConnector::new());
    let tenant = Arc::new(TenantContext::new("old-tenant"));
    let manager = SessionManager::builder(test_config())
        .with_credentials(Arc::new(StaticCredentials::new("token-1")))
        .with_tenant(tenant.clone())
        .with_connector(connector.clone())
        .with_runtime(session.handle().clone())
        .with_delivery_handle(delivery.handle().clone())
        .build()
        .unwrap();
    let subscriber = RecordingSubscriber::new();
    manager.register_subscriber(Topic::Analytics, &subscriber);

    manager.connect();
    session.block_on(settle());
    connector
        .server(Topic::Analytics)
        .unwrap()
        .send_json(json!({"tenant": "old-tenant"}));
    session.block_on(settle());

    tenant.set_tenant_id("new-tenant");
    assert!(manager.refresh_connections());
    session.block_on(settle());
    delivery.block_on(settle());

    assert!(subscriber.data(Topic::Analytics).is_empty());
    assert_eq!(subscriber.statuses(Topic::Analytics), vec![true, false, true]);

    let server = connector.server(Topic::Analytics).unwrap();
    assert_eq!(server.target().tenant_id, "new-tenant");
    server.send_json(json!({"tenant": "new-tenant"}));
    session.block_on(settle());
    delivery.block_on(settle());

    let data = subscriber.data(Topic::Analytics);
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["tenant"], json!("new-tenant"));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_reads_tenant_once_per_topic_after_auth_check() {
    let connector = Arc::new(MockConnector::new());
    let credentials = Arc::new(StaticCredentials::new("token-1"));
    let tenant = Arc::new(CountingTenant::default());
    let manager = SessionManager::builder(test_config())
        .with_credentials(credentials.clone())
        .with_tenant(tenant.clone())
        .with_connector(connector.clone())
        .build()
        .unwrap();
    manager.connect();
    settle().await;
    assert_eq!(tenant.reads(), 3);

    credentials.clear();
    assert!(!manager.refresh_connections());
    assert_eq!(tenant.reads(), 3);

    credentials.set_token("token-2");
    assert!(manager.refresh_connections());
    settle().await;
    assert_eq!(tenant.reads(), 6);

    // Each new connection carries a value read during this refresh
    let mut tenants: Vec<String> = Topic::ALL
        .into_iter()
        .map(|topic| connector.server(topic).unwrap().target().tenant_id.clone())
        .collect();
    tenants.sort();
    assert_eq!(tenants, vec!["tenant-4", "tenant-5", "tenant-6"]);
}

/// Hands out a fresh tenant id on every read
#[derive(Default)]
struct CountingTenant {
    reads: Mutex<usize>,
}

impl CountingTenant {
    fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

impl TenantProvider for CountingTenant {
    fn current_tenant_id(&self) -> String {
        let mut reads = self.reads.lock().unwrap();
        *reads += 1;
        format!("tenant-{}", *reads)
    }
}

#[tokio::test(start_paused = true)]
async fn test_health_snapshot_tracks_activity() {
    let h = harness();
    h.manager.connect();
    settle().await;

    let server = h.connector.server(Topic::Analytics).unwrap();
    server.send_json(json!({"n": 1}));
    server.send_json(json!({"n": 2}));
    settle().await;

    let snapshot = h.manager.health_snapshot();
    let analytics = &snapshot[&Topic::Analytics];
    assert_eq!(analytics.state, "open");
    assert_eq!(analytics.frames_received, 2);
    assert!(analytics.connected_since.is_some());
    assert!(analytics.last_frame_at.is_some());
    assert_eq!(snapshot[&Topic::System].frames_received, 0);

    h.manager.disconnect();
    settle().await;
    let analytics = h.manager.health(Topic::Analytics);
    assert_eq!(analytics.state, "idle");
    assert!(analytics.connected_since.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_drop_disconnects() {
    let h = harness();
    h.manager.connect();
    settle().await;

    let connector = h.connector.clone();
    let subscriber = h.subscriber.clone();
    drop(h);
    settle().await;

    for topic in Topic::ALL {
        assert_eq!(connector.live(topic), 0);
        assert_eq!(subscriber.statuses(topic), vec![true, false]);
    }
}
