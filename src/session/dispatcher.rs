//! Event dispatcher
//!
//! Each topic has its own unbounded queue drained by a task on the delivery
//! runtime, so events for one topic reach its subscriber in receipt order
//! while the connection workers never wait on subscriber code. The
//! subscriber is resolved when the event is delivered, not when it is
//! queued; an event whose topic has no live subscriber at that moment is
//! dropped.
//!
//! Events are stamped with the dispatcher generation they were queued
//! under. Tearing the session down bumps the generation, so data and error
//! events still queued for torn-down connections are discarded rather than
//! delivered after `disconnect` or `refresh_connections` has returned.
//! Status events are always delivered.

use super::registry::SubscriberTable;
use crate::protocol::{Record, SyncEvent, Topic};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Receives events for the topics it is registered on
///
/// Callbacks run on the dispatcher's delivery runtime, one at a time per
/// topic. They should return promptly; a slow callback delays later events
/// for the same topic only.
pub trait Subscriber: Send + Sync {
    fn on_data_received(&self, topic: Topic, payload: &Record);

    fn on_connection_status_changed(&self, topic: Topic, connected: bool);

    fn on_error(&self, topic: Topic, message: &str);
}

struct Queued {
    generation: u64,
    event: SyncEvent,
}

pub(crate) struct EventDispatcher {
    queues: HashMap<Topic, mpsc::UnboundedSender<Queued>>,
    generation: Arc<AtomicU64>,
}

impl EventDispatcher {
    /// Spawn one drain task per topic on `delivery`
    ///
    /// The tasks exit when the dispatcher is dropped.
    pub fn new(delivery: &Handle, subscribers: Arc<SubscriberTable>) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let queues = Topic::ALL
            .into_iter()
            .map(|topic| {
                let (tx, rx) = mpsc::unbounded_channel();
                delivery.spawn(drain(topic, rx, subscribers.clone(), generation.clone()));
                (topic, tx)
            })
            .collect();
        Self { queues, generation }
    }

    /// Queue `event` for its topic; never blocks
    pub fn enqueue(&self, event: SyncEvent) {
        let topic = event.topic();
        let queued = Queued {
            generation: self.generation.load(Ordering::SeqCst),
            event,
        };
        match self.queues.get(&topic) {
            Some(queue) => {
                if queue.send(queued).is_err() {
                    warn!(topic = %topic, "Delivery task has stopped, dropping event");
                }
            }
            None => warn!(topic = %topic, "No delivery queue for topic"),
        }
    }

    /// Mark every data and error event queued so far as stale
    pub fn retire_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Whether a queued event should still reach its subscriber (pure function)
fn is_deliverable(queued_under: u64, current: u64, event: &SyncEvent) -> bool {
    matches!(event, SyncEvent::Status { .. }) || queued_under == current
}

async fn drain(
    topic: Topic,
    mut queue: mpsc::UnboundedReceiver<Queued>,
    subscribers: Arc<SubscriberTable>,
    generation: Arc<AtomicU64>,
) {
    while let Some(Queued {
        generation: queued_under,
        event,
    }) = queue.recv().await
    {
        if !is_deliverable(queued_under, generation.load(Ordering::SeqCst), &event) {
            trace!(topic = %topic, "Discarding event from a torn-down connection");
            continue;
        }
        deliver(&subscribers, event);
    }
    trace!(topic = %topic, "Delivery queue closed");
}

/// Hand one event to the subscriber currently registered for its topic
pub(crate) fn deliver(subscribers: &SubscriberTable, event: SyncEvent) {
    let topic = event.topic();
    let Some(subscriber) = subscribers.lookup(topic) else {
        trace!(topic = %topic, "No subscriber registered, dropping event");
        return;
    };

    match event {
        SyncEvent::Data { payload, .. } => subscriber.on_data_received(topic, &payload),
        SyncEvent::Status { connected, .. } => {
            subscriber.on_connection_status_changed(topic, connected)
        }
        SyncEvent::Error { message, .. } => subscriber.on_error(topic, &message),
    }
}
